// Output of `argocd app diff` is a concatenation of per-resource blocks:
//
//   ===== apps/Deployment web/frontend ======
//   <unified diff>
//
//   ===== /ConfigMap web/settings ======
//   <unified diff>

use argodiff_defs::{AppResource, ResourceKey};

const BLOCK_DELIMITER: &str = "\n\n=====";

/// Splits raw diff output into blocks, each starting with its header line.
pub fn split_diff_blocks(output: &str) -> Vec<String> {
    let parts: Vec<&str> = output.split(BLOCK_DELIMITER).collect();
    if parts.len() == 1 {
        return vec![parts[0].to_string()];
    }
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut block = String::with_capacity(part.len() + 7);
            if i > 0 {
                block.push_str("=====");
            }
            block.push_str(part);
            if i < last {
                block.push_str("\n\n");
            }
            block
        })
        .collect()
}

/// Returns the first line and the rest, ignoring leading blank lines.
pub fn extract_first_line(input: &str) -> (&str, &str) {
    let input = input.trim_start_matches('\n');
    match input.split_once('\n') {
        Some((first, rest)) => (first, rest),
        None => (input, ""),
    }
}

/// Parses `===== group/kind namespace/name ======` into a resource key.
/// Malformed headers yield an empty key rather than an error.
pub fn extract_kubernetes_fields(header: &str) -> ResourceKey {
    let mut key = ResourceKey::default();
    let trimmed = header.trim_matches('=').trim();
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() != 2 {
        return key;
    }

    match fields[0].split_once('/') {
        Some((group, kind)) => {
            key.group = group.to_string();
            key.kind = kind.to_string();
        }
        None => key.kind = fields[0].to_string(),
    }
    match fields[1].split_once('/') {
        Some((namespace, name)) => {
            key.namespace = namespace.to_string();
            key.name = name.to_string();
        }
        None => key.name = fields[1].to_string(),
    }
    key
}

pub fn parse_diff_output(output: &str) -> Vec<AppResource> {
    split_diff_blocks(output)
        .iter()
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let (header, diff) = extract_first_line(block);
            let key = extract_kubernetes_fields(header);
            if key.kind.is_empty() && key.name.is_empty() {
                log::warn!("Unable to parse diff header {:?}", header);
            }
            AppResource::rendered(key, diff)
        })
        .collect()
}
