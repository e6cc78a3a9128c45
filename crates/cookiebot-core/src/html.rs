//! Minimal HTML entity decoding.
//!
//! Text pulled out of the page (golden-cookie effect descriptions, the
//! save-prompt textarea) can arrive with entity-encoded characters. Only
//! the five named core entities and numeric references are handled;
//! anything unrecognized is passed through untouched.

/// Longest entity body we bother scanning for, `&` and `;` excluded.
const MAX_ENTITY_LEN: usize = 10;

/// Decode `&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, and `&#NNN;` /
/// `&#xHH;` numeric references.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let semi = rest[1..]
            .char_indices()
            .take(MAX_ENTITY_LEN + 1)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i + 1);

        match semi {
            Some(semi) => {
                let body = &rest[1..semi];
                match decode_entity(body) {
                    Some(decoded) => {
                        out.push(decoded);
                        rest = &rest[semi + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &rest[1..];
                    }
                }
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(body: &str) -> Option<char> {
    match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = body.strip_prefix('#')?;
            let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                digits.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;b&gt;"), "<b>");
        assert_eq!(decode_entities("&quot;x&quot; &apos;y&apos;"), "\"x\" 'y'");
    }

    #[test]
    fn numeric_references() {
        assert_eq!(decode_entities("&#65;&#66;"), "AB");
        assert_eq!(decode_entities("&#x41;"), "A");
        assert_eq!(decode_entities("&#X2026;"), "\u{2026}");
    }

    #[test]
    fn unknown_and_unterminated_pass_through() {
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("trailing &"), "trailing &");
        assert_eq!(decode_entities("&#notanumber;"), "&#notanumber;");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(decode_entities("Lucky cookies x7"), "Lucky cookies x7");
        assert_eq!(decode_entities(""), "");
    }
}
