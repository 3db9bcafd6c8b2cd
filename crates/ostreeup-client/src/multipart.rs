//! Hand-rolled multipart/form-data body construction for the upload
//! phase. ureq has no typed multipart builder, and the wire format
//! here is small and fixed (one `file` part plus one `checksum` part
//! per object), so the body is assembled directly rather than pulling
//! in a dedicated multipart crate.

use std::path::Path;

use crate::error::ClientErr;

/// Builds a single-object upload body: a `file` part carrying the
/// object's bytes under its object name as the part filename, followed
/// by a `checksum` part carrying `"<object-name>:<hex-digest>"`.
///
/// Returns the encoded body and the `multipart/form-data; boundary=...`
/// content-type header value to send alongside it.
pub fn build_upload_body(
    object_name: &str,
    object_path: &Path,
    checksum_hex: &str,
) -> Result<(Vec<u8>, String), ClientErr> {
    let bytes = std::fs::read(object_path)
        .map_err(|source| ClientErr::Io { path: object_path.to_path_buf(), source })?;

    let boundary = format!("ostreeup-{}", hex::encode(rand_bytes()));
    let mut body = Vec::with_capacity(bytes.len() + 512);

    write_part_header(&mut body, &boundary, "file", Some(object_name));
    body.extend_from_slice(&bytes);
    body.extend_from_slice(b"\r\n");

    write_part_header(&mut body, &boundary, "checksum", None);
    body.extend_from_slice(format!("{object_name}:{checksum_hex}").as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok((body, format!("multipart/form-data; boundary={boundary}")))
}

fn write_part_header(body: &mut Vec<u8>, boundary: &str, name: &str, filename: Option<&str>) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    match filename {
        Some(filename) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\r\n"
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        ),
    }
}

fn rand_bytes() -> [u8; 8] {
    rand::random()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn body_contains_both_parts_and_trailing_boundary() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();

        let (body, content_type) =
            build_upload_body("deadbeef.file", file.path(), "abc123").unwrap();

        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("name=\"file\"; filename=\"deadbeef.file\""));
        assert!(text.contains("hello world"));
        assert!(text.contains("name=\"checksum\""));
        assert!(text.contains("deadbeef.file:abc123"));
        assert!(content_type.starts_with("multipart/form-data; boundary=ostreeup-"));
        assert!(text.trim_end().ends_with("--"));
    }
}
