//! Builders for test documents and HTTP requests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;

const BOUNDARY: &str = "finsight-test-boundary";

/// Builds a one-page PDF that shows each of `lines`.
pub fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut content = String::from("BT /F1 11 Tf 72 720 Td ");
    for line in lines {
        content.push_str(&format!("({}) Tj 0 -14 Td ", line));
    }
    content.push_str("ET");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("Failed to serialize test PDF");
    out
}

/// Builder for `multipart/form-data` uploads.
pub struct UploadBuilder {
    parts: Vec<u8>,
}

impl UploadBuilder {
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn file(mut self, filename: &str, content: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(content);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn query(mut self, query: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"query\"\r\n\r\n{}\r\n",
                BOUNDARY, query
            )
            .as_bytes(),
        );
        self
    }

    pub fn post(mut self, uri: &str) -> Request<Body> {
        self.parts
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::post(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.parts))
            .expect("Failed to build upload request")
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("Failed to build GET request")
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::delete(uri)
        .body(Body::empty())
        .expect("Failed to build DELETE request")
}

/// Reads a response body as JSON.
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
