#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Every text submission is stored as a .txt file.
const TEXT_SUFFIX         : &str = ".txt";

// Used when an upload has no usable file name.
const DEFAULT_UPLOAD_NAME : &str = "upload";

// ***************************************************************************
//                            Name Generation
// ***************************************************************************
// ---------------------------------------------------------------------------
// text_poem_name:
// ---------------------------------------------------------------------------
/** Generate the name of a text submission: <epoch-millis>.txt */
pub fn text_poem_name(ts: DateTime<Utc>) -> String {
    format!("{}{}", ts.timestamp_millis(), TEXT_SUFFIX)
}

// ---------------------------------------------------------------------------
// file_poem_name:
// ---------------------------------------------------------------------------
/** Generate the name of an uploaded file: <epoch-millis>-<original-filename>.
 *
 * Only the final component of the client's file name is kept, so a name like
 * "../../etc/passwd" becomes "passwd".  Both slash styles count as separators
 * since browsers on some platforms send the full client-side path.
 */
pub fn file_poem_name(ts: DateTime<Utc>, original: Option<&str>) -> String {
    format!("{}-{}", ts.timestamp_millis(), upload_base_name(original))
}

// ---------------------------------------------------------------------------
// upload_base_name:
// ---------------------------------------------------------------------------
fn upload_base_name(original: Option<&str>) -> &str {
    let base = original
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .map(str::trim)
        .unwrap_or_default();

    match base {
        "" | "." | ".." => DEFAULT_UPLOAD_NAME,
        b if b.contains('\0') => DEFAULT_UPLOAD_NAME,
        b => b,
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn text_names_use_epoch_millis() {
        assert_eq!(text_poem_name(ts()), "1700000000123.txt");
    }

    #[test]
    fn file_names_keep_original_name() {
        assert_eq!(file_poem_name(ts(), Some("ode.md")), "1700000000123-ode.md");
        assert_eq!(file_poem_name(ts(), Some("my ode.txt")), "1700000000123-my ode.txt");
    }

    #[test]
    fn file_names_drop_client_directories() {
        assert_eq!(file_poem_name(ts(), Some("../../etc/passwd")), "1700000000123-passwd");
        assert_eq!(file_poem_name(ts(), Some("C:\\poems\\haiku.txt")), "1700000000123-haiku.txt");
    }

    #[test]
    fn file_names_without_usable_original() {
        assert_eq!(file_poem_name(ts(), None), "1700000000123-upload");
        assert_eq!(file_poem_name(ts(), Some("")), "1700000000123-upload");
        assert_eq!(file_poem_name(ts(), Some("..")), "1700000000123-upload");
        assert_eq!(file_poem_name(ts(), Some("dir/")), "1700000000123-upload");
    }

    #[test]
    fn same_inputs_same_name() {
        assert_eq!(file_poem_name(ts(), Some("a.txt")), file_poem_name(ts(), Some("a.txt")));
    }
}
