use schoolbook::template::{Context, TemplateValue, render_str, render_template};
use std::collections::HashMap;
use std::path::PathBuf;

fn temp_template_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "schoolbook-templates-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_text_and_variable() {
    let mut context = Context::new();
    context.insert(
        "username".to_string(),
        TemplateValue::String("Alessandro".to_string()),
    );
    let rendered = render_str("Hello, {{ username }}!", &context);
    assert_eq!(rendered, "Hello, Alessandro!");
}

#[test]
fn test_missing_variable_renders_empty() {
    let context = Context::new();
    let rendered = render_str("Hello, {{ username }}!", &context);
    assert_eq!(rendered, "Hello, !");
}

#[test]
fn test_dotted_variable_path() {
    let mut user = HashMap::new();
    user.insert(
        "name".to_string(),
        TemplateValue::String("Priya".to_string()),
    );
    let mut context = Context::new();
    context.insert("user".to_string(), TemplateValue::Object(user));
    let rendered = render_str("Welcome, {{ user.name }}", &context);
    assert_eq!(rendered, "Welcome, Priya");
}

#[test]
fn test_if_true_branch() {
    let mut context = Context::new();
    context.insert("is_admin".to_string(), TemplateValue::Bool(true));
    let rendered = render_str(
        "{% if is_admin %}Welcome admin!{% else %}Welcome user!{% endif %}",
        &context,
    );
    assert_eq!(rendered, "Welcome admin!");
}

#[test]
fn test_if_false_branch() {
    let mut context = Context::new();
    context.insert("is_admin".to_string(), TemplateValue::Bool(false));
    let rendered = render_str(
        "{% if is_admin %}Welcome admin!{% else %}Welcome user!{% endif %}",
        &context,
    );
    assert_eq!(rendered, "Welcome user!");
}

#[test]
fn test_if_treats_empty_list_as_false() {
    let mut context = Context::new();
    context.insert("cities".to_string(), TemplateValue::List(Vec::new()));
    let rendered = render_str("{% if cities %}chips{% else %}none{% endif %}", &context);
    assert_eq!(rendered, "none");

    context.insert(
        "cities".to_string(),
        TemplateValue::List(vec![TemplateValue::String("Rajkot".to_string())]),
    );
    let rendered = render_str("{% if cities %}chips{% else %}none{% endif %}", &context);
    assert_eq!(rendered, "chips");
}

#[test]
fn test_missing_condition_is_false() {
    let context = Context::new();
    let rendered = render_str("{% if nope %}yes{% else %}no{% endif %}", &context);
    assert_eq!(rendered, "no");
}

#[test]
fn test_for_loop() {
    let mut context = Context::new();
    context.insert(
        "cities".to_string(),
        TemplateValue::List(vec![
            TemplateValue::String("Rajkot".to_string()),
            TemplateValue::String("Vadodara".to_string()),
        ]),
    );
    let rendered = render_str("{% for city in cities %}{{ city }},{% endfor %}", &context);
    assert_eq!(rendered, "Rajkot,Vadodara,");
}

#[test]
fn test_tailwind_tag_inserts_cdn() {
    let context = Context::new();
    let rendered = render_str("start{% tailwind %}end", &context);
    assert!(rendered.contains("https://cdn.tailwindcss.com"));
    assert!(rendered.starts_with("start"));
    assert!(rendered.ends_with("end"));
}

#[test]
fn test_unknown_tag_is_skipped() {
    let context = Context::new();
    let rendered = render_str("before{% unknown_tag whatisthis %}after", &context);
    assert_eq!(rendered, "beforeafter");
}

#[test]
fn test_block_and_extends() {
    let dir = temp_template_dir("extends");
    std::fs::write(
        dir.join("base.html"),
        "{% block content %}Base{% endblock %}!",
    )
    .unwrap();
    std::fs::write(
        dir.join("child.html"),
        "{% extends \"base.html\" %}{% block content %}Hello{% endblock %}",
    )
    .unwrap();

    let context = Context::new();
    let response = render_template(dir.to_str().unwrap(), "child.html", &context);
    assert_eq!(response.status_code, 200);
    assert_eq!(String::from_utf8(response.body).unwrap(), "Hello!");
}

#[test]
fn test_unoverridden_block_keeps_base_content() {
    let dir = temp_template_dir("default-block");
    std::fs::write(
        dir.join("base.html"),
        "{% block title %}Schoolbook{% endblock %}|{% block content %}{% endblock %}",
    )
    .unwrap();
    std::fs::write(
        dir.join("child.html"),
        "{% extends \"base.html\" %}{% block content %}body{% endblock %}",
    )
    .unwrap();

    let context = Context::new();
    let response = render_template(dir.to_str().unwrap(), "child.html", &context);
    assert_eq!(String::from_utf8(response.body).unwrap(), "Schoolbook|body");
}

#[test]
fn test_template_not_found_is_404() {
    let dir = temp_template_dir("missing");
    let context = Context::new();
    let response = render_template(dir.to_str().unwrap(), "nope.html", &context);
    assert_eq!(response.status_code, 404);
    assert!(
        String::from_utf8(response.body)
            .unwrap()
            .contains("not found")
    );
}
