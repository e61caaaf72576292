#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode, Uri},
    response::Response,
    Router,
};

/// Path to the compiled `gazette` binary next to the test executable.
pub fn gazette_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gazette");
    path
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Minimal multi-page PDF with one Helvetica text line per entry.
///
/// Lines must be plain ASCII without parentheses or backslashes.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", 4 + 2 * i)).collect();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            pages.len()
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, lines) in pages.iter().enumerate() {
        let page_id = 4 + 2 * i;
        let content_id = page_id + 1;

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id, content_id
            )
            .as_bytes(),
        );

        let mut stream = String::from("BT /F1 10 Tf 40 750 Td\n");
        for line in lines.iter() {
            stream.push_str(&format!("({}) Tj 0 -14 Td\n", line));
        }
        stream.push_str("ET");

        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id,
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    let size = offsets.len() + 1;
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            size, xref_start
        )
        .as_bytes(),
    );
    out
}

pub const RELEVANT_LINES: &[&str] = &[
    "BOLETIN OFICIAL DE PRUEBA NUMERO 7",
    "ORDEN de 10 de enero de 2024, de la Consejeria de Agricultura, Ganaderia y Desarrollo Sostenible,",
    "por la que se convocan subvenciones para la modernizacion de explotaciones agrarias en zonas rurales.",
];

pub const IRRELEVANT_LINES: &[&str] = &[
    "BOLETIN OFICIAL DE PRUEBA NUMERO 8",
    "RESOLUCION de 11 de enero de 2024, de la Direccion General de Tributos, por la que se aprueban",
    "los modelos de declaracion del impuesto sobre transmisiones patrimoniales y actos juridicos documentados.",
];

pub fn relevant_pdf() -> Vec<u8> {
    pdf_with_pages(&[RELEVANT_LINES])
}

pub fn irrelevant_pdf() -> Vec<u8> {
    pdf_with_pages(&[IRRELEVANT_LINES])
}

/// A canned HTTP response served by [`spawn_fixture_server`].
#[derive(Clone)]
pub struct Fixture {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Fixture {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type,
            body: body.into(),
        }
    }

    pub fn pdf(body: Vec<u8>) -> Self {
        Self::ok("application/pdf", body)
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: status.to_string().into_bytes(),
        }
    }
}

async fn serve_fixture(
    State(fixtures): State<Arc<HashMap<String, Fixture>>>,
    uri: Uri,
) -> Response {
    let key = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let fixture = fixtures
        .get(&key)
        .or_else(|| fixtures.get(uri.path()))
        .cloned()
        .unwrap_or_else(|| Fixture::status(StatusCode::NOT_FOUND));

    Response::builder()
        .status(fixture.status)
        .header(header::CONTENT_TYPE, fixture.content_type)
        .body(Body::from(fixture.body))
        .unwrap()
}

/// Serve canned responses keyed by path on an ephemeral port. Returns the
/// base URL, e.g. `http://127.0.0.1:41234`.
pub async fn spawn_fixture_server(fixtures: Vec<(&str, Fixture)>) -> String {
    let owned: Vec<(String, Fixture)> = fixtures
        .into_iter()
        .map(|(path, fixture)| (path.to_string(), fixture))
        .collect();
    spawn_fixture_server_with(move |_| owned).await
}

/// Like [`spawn_fixture_server`], for fixtures whose bodies must embed the
/// server's own base URL (listings pointing at documents).
pub async fn spawn_fixture_server_with<F>(build: F) -> String
where
    F: FnOnce(&str) -> Vec<(String, Fixture)>,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let map: HashMap<String, Fixture> = build(&base).into_iter().collect();
    let app = Router::new()
        .fallback(serve_fixture)
        .with_state(Arc::new(map));

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    base
}

/// RSS 2.0 listing whose items enclose the given URLs.
pub fn rss_listing(urls: &[String]) -> String {
    let items: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                "<item><title>Boletin {}</title><link>{}</link><enclosure url=\"{}\" type=\"application/pdf\"/></item>",
                i + 1,
                url,
                url
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><rss version=\"2.0\"><channel><title>Boletin</title>{}</channel></rss>",
        items
    )
}
