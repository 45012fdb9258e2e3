//! `stepwise tools`: List the built-in tools.

use stepwise_core::schema::required_fields;
use stepwise_core::tool::ToolRegistry;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = stepwise_tools::default_registry()?;
    print!("{}", render(&registry));
    Ok(())
}

fn render(registry: &ToolRegistry) -> String {
    let mut out = String::new();
    for tool in registry.list() {
        let schema = tool.parameters_schema();
        let required = required_fields(&schema);
        out.push_str(&format!("{}\n    {}\n", tool.name(), tool.description()));
        if !required.is_empty() {
            out.push_str(&format!("    required: {}\n", required.join(", ")));
        }
    }
    out
}
