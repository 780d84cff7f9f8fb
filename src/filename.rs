/// Prefix the server gives to uploaded files
const UPLOAD_PREFIX: &str = "source_";
/// Prefix of the processed archive that replaces it
const RESULT_PREFIX: &str = "archive_";

/// Derives the result archive name from the server-assigned upload name
///
/// Replaces the first `source_` with `archive_`, then swaps a trailing
/// `.csv` or `.txt` for `.zip`. Empty input is returned unchanged.
///
/// # Example
/// ```
/// use bulkxfer::filename::download_file_name;
/// assert_eq!(download_file_name("source_data.csv"), "archive_data.zip");
/// ```
pub fn download_file_name(uploaded: &str) -> String {
    if uploaded.is_empty() {
        return String::new();
    }

    let renamed = uploaded.replacen(UPLOAD_PREFIX, RESULT_PREFIX, 1);
    match renamed
        .strip_suffix(".csv")
        .or_else(|| renamed.strip_suffix(".txt"))
    {
        Some(stem) => format!("{}.zip", stem),
        None => renamed,
    }
}
