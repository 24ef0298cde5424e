use axum::{
    body::Body,
    extract::{FromRequest, Multipart},
    http::Request,
    response::Response,
};
use serde::de::DeserializeOwned;

const BOUNDARY: &str = "MY_BOUNDARY123456789";

/// A file part of a multipart form.
#[derive(Debug, Clone)]
pub(crate) struct MultipartFile {
    pub(crate) field: String,
    pub(crate) filename: String,
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl MultipartFile {
    pub(crate) fn new(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            field: field.to_owned(),
            filename: filename.to_owned(),
            content_type: content_type.to_owned(),
            data: data.to_vec(),
        }
    }
}

/// Build a multipart form with the text `fields` followed by the `files`.
pub(crate) async fn must_make_multipart(
    fields: &[(&str, &str)],
    files: &[MultipartFile],
) -> Multipart {
    let mut data: Vec<u8> = Vec::new();

    for (name, value) in fields {
        data.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        data.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        data.extend_from_slice(value.as_bytes());
        data.extend_from_slice(b"\r\n");
    }

    for file in files {
        data.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        data.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                file.field, file.filename
            )
            .as_bytes(),
        );
        data.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        data.extend_from_slice(&file.data);
        data.extend_from_slice(b"\r\n");
    }

    data.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(data))
        .unwrap();

    Multipart::from_request(request, &()).await.unwrap()
}

/// Read the body of `response` as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("could not read response body");

    serde_json::from_slice(&body).expect("response body is not valid JSON")
}
