//! URL-escaping shared by the wire client (subjects in paths) and the local file
//! format (subjects in filenames).

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

const SUBJECT_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'-');

pub fn escape(subject: &str) -> String {
    utf8_percent_encode(subject, SUBJECT_ESCAPE).to_string()
}

pub fn unescape(escaped: &str) -> Result<String, std::str::Utf8Error> {
    Ok(percent_decode_str(escaped).decode_utf8()?.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_plain_subject() {
        let subject = "someSubject-value";
        assert_eq!(unescape(&escape(subject)).unwrap(), subject);
    }

    #[test]
    fn escapes_path_separators_and_hyphens() {
        let escaped = escape("a/b-c");
        assert!(!escaped.contains('/'));
        assert_eq!(unescape(&escaped).unwrap(), "a/b-c");
    }
}
