mod changes;
mod cli;
mod client;
mod diff_output;
mod discovery;
mod http;
mod manifests;
mod matcher;
mod path_filter;

pub use changes::{get_application_changes, multi_source_target};
pub use cli::{common_args, diff_args, interpret_diff_output, parse_version_output, CliClient, CommandOutput};
pub use client::{
    connectivity_check, new_platform_client, DiffOutcome, DiffTarget, ManagedResource,
    PlatformClient, PlatformVersion,
};
pub use diff_output::{extract_first_line, extract_kubernetes_fields, parse_diff_output, split_diff_blocks};
pub use discovery::{changed_application_names, discover_changed_applications, nested_diff_target};
pub use http::{api_base_url, pair_resources, strip_server_fields, HttpClient};
pub use manifests::{manifest_to_application, parse_manifest_value, split_manifest_documents, ManifestValue};
pub use matcher::{app_names, check_source, filter_applications, git_repo_match};
pub use path_filter::{filter_by_path, match_changed_files, resolve_pattern};
