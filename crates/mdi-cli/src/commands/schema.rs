use mdi_engine::core::protocol::{Node, schema};
use std::fmt::Write;

/// Renders the commands accepted at every node, one node per block.
pub fn render_schema() -> String {
    let mut out = String::new();
    for node in Node::ALL {
        let tokens: Vec<String> = schema::commands_at(node)
            .into_iter()
            .map(|command| command.to_string())
            .collect();
        let _ = writeln!(out, "{} ({} commands)", node, tokens.len());
        for line in tokens.chunks(8) {
            let _ = writeln!(out, "    {}", line.join(" "));
        }
    }
    out
}

pub fn run() {
    print!("{}", render_schema());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block<'a>(rendered: &'a str, node: &str) -> &'a str {
        let start = rendered.find(&format!("{node} (")).unwrap();
        let rest = &rendered[start..];
        let end = rest[1..].find("\n@").map_or(rest.len(), |i| i + 1);
        &rest[..end]
    }

    #[test]
    fn every_node_is_listed() {
        let rendered = render_schema();
        for node in Node::ALL {
            assert!(rendered.contains(&format!("{node} (")), "{node} missing");
        }
    }

    #[test]
    fn initialization_commands_appear_only_at_default() {
        let rendered = render_schema();
        assert!(block(&rendered, "@DEFAULT").contains("MD_INIT"));
        assert!(!block(&rendered, "@FORCES").contains("MD_INIT"));
        assert!(!block(&rendered, "@INIT_OPTG").contains("@PRE-FORCES"));
        assert!(block(&rendered, "@INIT_MD").contains("@PRE-FORCES"));
    }
}
