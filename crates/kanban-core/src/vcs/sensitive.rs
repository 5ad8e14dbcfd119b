/// Whether a staged path looks like it holds secrets and must stay out of commits.
///
/// Matches paths containing `.env`, ending in `.pem` or `.key`, or mentioning
/// `credentials` / `secret` in any case.
#[must_use]
pub fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    path.contains(".env")
        || path.ends_with(".pem")
        || path.ends_with(".key")
        || lower.contains("credentials")
        || lower.contains("secret")
}
