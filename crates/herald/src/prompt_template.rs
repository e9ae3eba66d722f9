use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}

/// Render a template file
///
/// A path that exists on disk wins; anything else is looked up among the prompts compiled into
/// the binary.
pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();

    let template_content = if template_path.exists() {
        fs::read_to_string(&template_path)
            .map_err(|e| TeraError::chain("Failed to read template file", e))?
    } else {
        PROMPTS
            .get_file(&template_path)
            .and_then(|file| file.contents_utf8())
            .ok_or_else(|| {
                TeraError::msg(format!("Template not found: {}", template_path.display()))
            })?
            .to_string()
    };

    load_prompt(&template_content, context_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Topic: {{ input }}";
        let mut context = HashMap::new();
        context.insert("input", "oat milk");

        assert_eq!(load_prompt(template, &context).unwrap(), "Topic: oat milk");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let context: HashMap<&str, &str> = HashMap::new();
        assert!(load_prompt("Hello, {{ name }}!", &context).is_err());
    }

    #[test]
    fn test_load_prompt_file_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test_template.md");
        fs::write(&file_path, "Hello, {{ name }}!").unwrap();

        let result = load_prompt_file(file_path, &json!({"name": "Bob"})).unwrap();
        assert_eq!(result, "Hello, Bob!");
    }

    #[test]
    fn test_embedded_task_templates_render_input() {
        for name in ["research_task.md", "content_task.md"] {
            let rendered = load_prompt_file(name, &json!({"input": "UNIQUE-TOPIC-MARKER"})).unwrap();
            assert!(rendered.contains("UNIQUE-TOPIC-MARKER"), "{name}");
        }
    }

    #[test]
    fn test_embedded_system_templates_render_without_systems() {
        for name in ["research_system.md", "content_system.md"] {
            let rendered = load_prompt_file(name, &json!({"systems": []})).unwrap();
            assert!(!rendered.is_empty(), "{name}");
        }
    }

    #[test]
    fn test_missing_template() {
        assert!(load_prompt_file("nope.md", &json!({})).is_err());
    }
}
