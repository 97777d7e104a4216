//! Share tokens: a model's raw bytes packed into a URL fragment.
//!
//! A token reads `ext=stl&name=Gear.stl&data=...`. STL payloads are the
//! base64 of the file bytes; OBJ payloads are percent-escaped first so the
//! text survives any non-ASCII content. Every value is component-escaped so
//! base64's `+`, `/` and `=` pass through URL parsers untouched.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::config::ShareConfig;
use crate::error::{Error, Result};
use crate::format::{ModelFormat, ModelSource};

/// Characters `encodeURIComponent` escapes: all but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode raw model bytes into a share token.
///
/// Fails with `PayloadTooLarge` above the configured limit; callers are
/// expected to fall back to out-of-band storage in that case.
pub fn encode(data: &[u8], extension: &str, name: &str, config: &ShareConfig) -> Result<String> {
    let format: ModelFormat = extension.parse()?;

    if data.len() > config.max_payload_bytes {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            limit: config.max_payload_bytes,
        });
    }

    let payload = match format {
        ModelFormat::Stl => STANDARD.encode(data),
        ModelFormat::Obj => STANDARD.encode(escape_bytes(data)),
    };

    let token = format!(
        "ext={}&name={}&data={}",
        format,
        utf8_percent_encode(name, URI_COMPONENT),
        utf8_percent_encode(&payload, URI_COMPONENT),
    );
    debug!(format = %format, size = data.len(), token_len = token.len(), "Encoded share token");
    Ok(token)
}

/// Decode a share token produced by [`encode`].
///
/// A leading `#` is accepted so a raw URL fragment can be passed as-is.
/// Unknown fields are ignored; a missing `name` defaults to
/// `shared_model.<ext>`.
pub fn decode(token: &str) -> Result<ModelSource> {
    let token = token.strip_prefix('#').unwrap_or(token);

    let mut ext = None;
    let mut name = None;
    let mut data = None;
    for field in token.split('&').filter(|f| !f.is_empty()) {
        let (key, value) = field.split_once('=').unwrap_or((field, ""));
        let value = unescape_component(value)?;
        match key {
            "ext" => ext = Some(value),
            "name" => name = Some(value),
            "data" => data = Some(value),
            _ => {}
        }
    }

    let ext = ext.ok_or_else(|| invalid("missing ext field"))?;
    let payload = data.ok_or_else(|| invalid("missing data field"))?;
    let format: ModelFormat = ext
        .parse()
        .map_err(|_| invalid(format!("unsupported ext {ext:?}")))?;

    let decoded = STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| invalid(format!("bad base64 payload: {e}")))?;

    let data = match format {
        ModelFormat::Stl => decoded,
        ModelFormat::Obj => {
            let escaped = std::str::from_utf8(&decoded)
                .map_err(|_| invalid("OBJ payload is not percent-escaped text"))?;
            unescape_bytes(escaped)?
        }
    };

    let name = name.unwrap_or_else(|| format!("shared_model.{format}"));
    Ok(ModelSource { data, format, name })
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidShareToken(reason.into())
}

/// Percent-escape arbitrary bytes with the URI component set.
fn escape_bytes(data: &[u8]) -> String {
    percent_encoding::percent_encode(data, URI_COMPONENT).to_string()
}

fn unescape_bytes(escaped: &str) -> Result<Vec<u8>> {
    check_escapes(escaped)?;
    Ok(percent_decode_str(escaped).collect())
}

fn unescape_component(value: &str) -> Result<String> {
    check_escapes(value)?;
    percent_decode_str(value)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|_| invalid("field is not valid UTF-8"))
}

/// `percent_decode` passes malformed escapes through verbatim; reject them
/// instead, as `decodeURIComponent` does.
fn check_escapes(value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(invalid(format!("malformed percent escape at byte {i}")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config() -> ShareConfig {
        ShareConfig::default()
    }

    #[test]
    fn test_stl_round_trip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let token = encode(&data, "stl", "Gear Box.stl", &config()).unwrap();
        assert!(token.starts_with("ext=stl&name=Gear%20Box.stl&data="));

        let shared = decode(&token).unwrap();
        assert_eq!(shared.data, data);
        assert_eq!(shared.format, ModelFormat::Stl);
        assert_eq!(shared.name, "Gear Box.stl");
    }

    #[test]
    fn test_obj_round_trip_non_ascii() {
        let text = "# Çark ve dişli\no Dişli\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let token = encode(text.as_bytes(), "obj", "dişli.obj", &config()).unwrap();
        let shared = decode(&token).unwrap();
        assert_eq!(shared.data, text.as_bytes());
        assert_eq!(shared.format, ModelFormat::Obj);
        assert_eq!(shared.name, "dişli.obj");
    }

    #[test]
    fn test_obj_payload_is_escaped_before_base64() {
        let token = encode(b"v 1 2 3", "obj", "a.obj", &config()).unwrap();
        let data = token.split("data=").nth(1).unwrap();
        let payload = percent_decode_str(data).decode_utf8().unwrap();
        assert_eq!(STANDARD.decode(payload.as_bytes()).unwrap(), b"v%201%202%203");
    }

    #[test]
    fn test_token_is_fragment_safe() {
        // Bytes chosen so the base64 alphabet hits '+' and '/'
        let token = encode(&[0xfb, 0xff, 0xfe], "stl", "x", &config()).unwrap();
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('#'));
    }

    #[test]
    fn test_size_gate() {
        let limit = config().max_payload_bytes;
        let at_limit = vec![7u8; limit];
        assert!(encode(&at_limit, "stl", "big.stl", &config()).is_ok());

        let five_mib = vec![0u8; 5 * 1024 * 1024];
        assert!(matches!(
            encode(&five_mib, "stl", "huge.stl", &config()),
            Err(Error::PayloadTooLarge { size, limit: 4194304 }) if size == 5 * 1024 * 1024
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            encode(b"ISO-10303-21;", "step", "a.step", &config()),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_name_defaults() {
        let shared = decode("#ext=obj&data=dg%3D%3D").unwrap();
        assert_eq!(shared.name, "shared_model.obj");
        assert_eq!(shared.data, b"v");
    }

    #[test]
    fn test_empty_name_round_trips() {
        let token = encode(b"solid", "stl", "", &config()).unwrap();
        assert_eq!(decode(&token).unwrap().name, "");
    }

    #[test]
    fn test_malformed_tokens() {
        for token in [
            "",
            "name=a.stl&data=AAAA",
            "ext=stl&name=a.stl",
            "ext=ply&data=AAAA",
            "ext=stl&data=!!!not-base64",
            "ext=stl&name=%E0%A4%A&data=AAAA",
            "ext=obj&data=JTI",
            "ext=stl&name=%FF&data=AAAA",
        ] {
            assert!(
                matches!(decode(token), Err(Error::InvalidShareToken(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            data in prop::collection::vec(any::<u8>(), 0..2048),
            obj in any::<bool>(),
            name in ".{0,24}",
        ) {
            let ext = if obj { "obj" } else { "stl" };
            let token = encode(&data, ext, &name, &config()).unwrap();
            let shared = decode(&token).unwrap();
            prop_assert_eq!(shared.data, data);
            prop_assert_eq!(shared.format.as_str(), ext);
            prop_assert_eq!(shared.name, name);
        }
    }
}
