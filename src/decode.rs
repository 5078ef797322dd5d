use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{BinaryBody, FetchError, FormData, FormValue, Response, Result};

impl Response {
    /// Decodes the body as JSON.
    ///
    /// An empty body is an error, matching what a JSON parser makes of "".
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(self.body()).map_err(|err| {
            FetchError::Decode(format!(
                "invalid JSON body: {err}; body: {}",
                String::from_utf8_lossy(self.body())
            ))
        })
    }

    /// Decodes the body as UTF-8 text; invalid sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.body()).into_owned()
    }

    /// Decodes an `application/x-www-form-urlencoded` or
    /// `multipart/form-data` body.
    pub fn form_data(&self) -> Result<FormData> {
        let content_type = self.content_type().unwrap_or_default();
        let mime = media_type(content_type);

        if mime.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            return Ok(decode_urlencoded(self.body()));
        }
        if mime.eq_ignore_ascii_case("multipart/form-data") {
            let boundary = parameter(content_type, "boundary").ok_or_else(|| {
                FetchError::Decode("multipart content type without boundary".to_owned())
            })?;
            return decode_multipart(self.body(), &boundary);
        }

        Err(FetchError::Decode(format!(
            "cannot decode form data from content type '{content_type}'"
        )))
    }

    pub fn array_buffer(&self) -> Vec<u8> {
        self.body().to_vec()
    }

    pub fn binary(&self) -> BinaryBody {
        BinaryBody {
            content_type: self.content_type().map(str::to_owned),
            data: self.body().clone(),
        }
    }
}

fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or_default().trim()
}

/// Looks up a `;`-separated parameter of a header value, unquoting it.
fn parameter(header_value: &str, name: &str) -> Option<String> {
    header_value.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case(name) {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        Some(value.to_owned())
    })
}

fn decode_urlencoded(body: &[u8]) -> FormData {
    let mut form = FormData::new();
    for (name, value) in url::form_urlencoded::parse(body) {
        form.append(name.into_owned(), FormValue::Text(value.into_owned()));
    }
    form
}

fn decode_multipart(body: &Bytes, boundary: &str) -> Result<FormData> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let malformed = |what: &str| FetchError::Decode(format!("malformed multipart body: {what}"));

    let mut cursor = find(body, delimiter, 0).ok_or_else(|| malformed("missing boundary"))?
        + delimiter.len();
    let mut form = FormData::new();

    loop {
        if body[cursor..].starts_with(b"--") {
            return Ok(form);
        }
        cursor = skip_line_break(body, cursor);

        let headers_end =
            find(body, b"\r\n\r\n", cursor).ok_or_else(|| malformed("unterminated part headers"))?;
        let headers = std::str::from_utf8(&body[cursor..headers_end])
            .map_err(|_| malformed("part headers are not UTF-8"))?;
        let data_start = headers_end + 4;

        let mut closing = Vec::with_capacity(delimiter.len() + 2);
        closing.extend_from_slice(b"\r\n");
        closing.extend_from_slice(delimiter);
        let data_end =
            find(body, &closing, data_start).ok_or_else(|| malformed("unterminated part"))?;

        let (name, value) = decode_part(headers, body.slice(data_start..data_end))
            .ok_or_else(|| malformed("part without a form-data name"))?;
        form.append(name, value);

        cursor = data_end + closing.len();
    }
}

fn decode_part(headers: &str, data: Bytes) -> Option<(String, FormValue)> {
    let mut disposition = None;
    let mut content_type = None;
    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            disposition = Some(value.trim());
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_owned());
        }
    }

    let disposition = disposition?;
    let name = parameter(disposition, "name")?;
    let filename = parameter(disposition, "filename");

    let value = if filename.is_some() || content_type.is_some() {
        FormValue::File {
            filename,
            content_type,
            data,
        }
    } else {
        FormValue::Text(String::from_utf8_lossy(&data).into_owned())
    };
    Some((name, value))
}

fn skip_line_break(body: &[u8], cursor: usize) -> usize {
    if body[cursor..].starts_with(b"\r\n") {
        cursor + 2
    } else if body[cursor..].starts_with(b"\n") {
        cursor + 1
    } else {
        cursor
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}
