/// Replace every occurrence of every secret in `text` with `***`.
///
/// Error text from external commands may embed the credential that was passed
/// on the command line; it must be masked before the text reaches a log.
pub fn mask_secrets(text: &str, secrets: &[&str]) -> String {
    let mut masked = text.to_string();
    for secret in secrets {
        if secret.is_empty() {
            continue;
        }
        masked = masked.replace(secret, "***");
    }
    masked
}
