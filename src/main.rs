use schoolbook::media::MediaStore;
use schoolbook::orm::{Db, Model};
use schoolbook::schools::School;
use schoolbook::server;
use schoolbook::settings::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if settings.debug { "debug" } else { "info" }),
    )
    .init();

    let db = Db::connect(&settings.database.url()).await?;
    School::migrate(&db).await?;

    let media = MediaStore::new(settings.media.root.clone());
    media.prepare().await?;

    server::run(settings, db, media).await
}
