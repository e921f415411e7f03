//! ASCII tree rendering for the feature class containment hierarchy.

use crate::registry::ContainmentNode;

const COLLECTION: char = '▣';
const FEATURE: char = '●';

fn kind_symbol(node: &ContainmentNode) -> char {
    if node.collection {
        COLLECTION
    } else {
        FEATURE
    }
}

/// Render a containment tree as ASCII art, one class per line.
///
/// Example output:
/// ```text
/// ▣ Folder (app_folder)
/// ├── ▣ Array (app_array)
/// │   └── ● Marine Protected Area (app_mpa)
/// └── ● Pipeline (app_pipeline)
/// ```
pub fn render_tree(nodes: &[ContainmentNode]) -> String {
    let mut output = String::new();
    for node in nodes {
        render_node(&mut output, node, "", true, true);
    }
    output
}

fn render_node(output: &mut String, node: &ContainmentNode, prefix: &str, is_last: bool, is_root: bool) {
    if !is_root {
        output.push_str(prefix);
        output.push_str(if is_last { "└── " } else { "├── " });
    }
    output.push(kind_symbol(node));
    output.push(' ');
    output.push_str(&format!("{} ({})\n", node.verbose_name, node.model_uid));

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.children.iter().enumerate() {
        let child_is_last = i == node.children.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
