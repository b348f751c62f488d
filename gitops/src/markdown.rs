use argodiff_defs::ResourceKey;
use argodiff_utils::{capitalize_words, truncate_lines};

/// GitHub rejects comments above 262,144 characters.
pub const MAX_COMMENT_LEN: usize = 261_500;
pub const MAX_RESOURCE_DIFF_LEN: usize = 260_000;
/// Warnings carry platform stderr, which can be arbitrarily long.
const MAX_WARNING_LEN: usize = 2_000;

pub const CONTINUED_NOTE: &str = "\n\n[Continued in next comment]\n";
pub const TOO_LARGE_PLACEHOLDER: &str = "`<<< DIFF TOO LARGE TO DISPLAY >>>`";
const DETAILS_CLOSE: &str = "</details>\n\n";

pub fn sync_string(status: &str) -> String {
    let glyph = match status {
        // sync state could not be reliably determined
        "Unknown" => ":question:",
        "Synced" => ":white_check_mark:",
        // drift between desired and live states
        "OutOfSync" => ":warning:",
        _ => ":interrobang:",
    };
    format!("{} {}", status, glyph)
}

pub fn health_string(status: &str, message: &str) -> String {
    let glyph = match status {
        "Unknown" => ":question:",
        "Progressing" => ":hourglass_flowing_sand:",
        "Healthy" => ":green_heart:",
        "Suspended" => ":no_entry_sign:",
        "Degraded" => ":x:",
        "Missing" => ":ghost:",
        _ => ":interrobang:",
    };
    if message.is_empty() {
        format!("{} {}", status, glyph)
    } else {
        format!("{} {} - {}", status, glyph, message)
    }
}

/// Markdown for one application: its overview plus a rendered block per changed resource.
#[derive(Clone, Debug, Default)]
pub struct AppMarkdown {
    pub name: String,
    pub warning: String,
    pub sync_status: String,
    pub health_status: String,
    pub health_message: String,
    pub resources: Vec<String>,
    line_max_chars: usize,
}

impl AppMarkdown {
    pub fn add_resource_diff(&mut self, key: &ResourceKey, diff: &str) {
        let mut md = String::from("\n<details open>\n");
        md.push_str(&format!("  <summary>===== {} =====</summary>\n\n", key));

        let mut diff_md = String::new();
        if !diff.is_empty() {
            diff_md.push_str("```diff\n");
            diff_md.push_str(&truncate_lines(diff, self.line_max_chars));
            if !diff.ends_with('\n') {
                diff_md.push('\n');
            }
            diff_md.push_str("```\n\n");
        }

        if md.len() + diff_md.len() > MAX_RESOURCE_DIFF_LEN {
            log::warn!("Diff of {} in {} too large to display", key, self.name);
            md.push_str(TOO_LARGE_PLACEHOLDER);
        } else {
            md.push_str(&diff_md);
        }
        md.push_str(DETAILS_CLOSE);
        self.resources.push(md);
    }

    pub fn overview(&self, continued: bool, ui_base_url: &str) -> String {
        let mut md = String::from("\n");
        if !continued {
            md.push_str("---\n");
        }
        md.push_str("<details open>\n");
        let title = capitalize_words(&self.name);
        if continued {
            md.push_str(&format!("<summary>=== {} (cont.) ===</summary>\n\n", title));
        } else {
            md.push_str(&format!("<summary>=== {} ===</summary>\n\n", title));
        }
        if !ui_base_url.is_empty() {
            md.push_str(&format!(
                "[ArgoCD UI]({}/applications/argocd/{})\n",
                ui_base_url.trim_end_matches('/'),
                self.name
            ));
        }
        md.push_str(&sync_string(&self.sync_status));
        md.push('\n');
        md.push_str(&health_string(&self.health_status, &self.health_message));
        md.push_str("\n\n");
        if !self.warning.is_empty() {
            md.push_str(&self.warning);
            md.push_str("\n\n");
        }
        md
    }
}

/// A pull request comment, split into pages that each fit in one GitHub comment.
#[derive(Clone, Debug)]
pub struct CommentMarkdown {
    pub preamble: String,
    pub apps: Vec<AppMarkdown>,
    ui_base_url: String,
    line_max_chars: usize,
    page_budget: usize,
}

impl CommentMarkdown {
    pub fn new(ui_base_url: &str, line_max_chars: usize) -> Self {
        CommentMarkdown {
            preamble: String::new(),
            apps: vec![],
            ui_base_url: ui_base_url.to_string(),
            line_max_chars,
            page_budget: MAX_COMMENT_LEN,
        }
    }

    pub fn with_page_budget(mut self, page_budget: usize) -> Self {
        self.page_budget = page_budget;
        self
    }

    pub fn add_app(
        &mut self,
        name: &str,
        warning: &str,
        sync_status: &str,
        health_status: &str,
        health_message: &str,
    ) -> &mut AppMarkdown {
        let warning = match warning.char_indices().nth(MAX_WARNING_LEN) {
            Some((idx, _)) => format!("{}...", &warning[..idx]),
            None => warning.to_string(),
        };
        self.apps.push(AppMarkdown {
            name: name.to_string(),
            warning: truncate_lines(&warning, self.line_max_chars)
                .trim_end_matches('\n')
                .to_string(),
            sync_status: sync_status.to_string(),
            health_status: health_status.to_string(),
            health_message: health_message.to_string(),
            resources: vec![],
            line_max_chars: self.line_max_chars,
        });
        let last = self.apps.len() - 1;
        &mut self.apps[last]
    }

    /// Splits the comment into pages no longer than the page budget.
    ///
    /// An application header is only placed on a page that also fits its first
    /// resource. When resources overflow a page, the page ends with a note and
    /// the next one reopens the application with a "(cont.)" header.
    pub fn pages(&self) -> Vec<String> {
        let budget = self.page_budget;
        let reserve = CONTINUED_NOTE.len().max(DETAILS_CLOSE.len());
        let mut pages = vec![];
        let mut md = self.preamble.clone();

        for app in &self.apps {
            let header = app.overview(false, &self.ui_base_url);
            let first = app.resources.first().map(String::as_str).unwrap_or("");
            if md.len() + header.len() + first.len() + reserve > budget && !md.is_empty() {
                pages.push(std::mem::take(&mut md));
            }
            md.push_str(&header);

            for resource in &app.resources {
                if md.len() + resource.len() + reserve > budget {
                    md.push_str(CONTINUED_NOTE);
                    pages.push(std::mem::take(&mut md));
                    md = app.overview(true, &self.ui_base_url);
                }
                md.push_str(resource);
            }
            md.push_str(DETAILS_CLOSE);
        }
        pages.push(md);
        pages
    }
}
