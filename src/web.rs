//! Minimal interactive form: one URL field, a "Create PDF" button and a
//! download link for the last document that was written.

use actix_web::{
    dev::Server,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    middleware::Logger,
    web::{self, Data},
    App, HttpResponse, HttpServer,
};
use askama::Template;
use serde::Deserialize;
use std::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::DEFAULT_OUTPUT_FILE;
use crate::converter::{Conversion, Converter};
use crate::transport::Transport;

#[derive(Template, Default)]
#[template(path = "index.html")]
struct IndexTemplate {
    url: String,
    notice: Option<String>,
    error: Option<String>,
    success: Option<String>,
    warnings: Vec<String>,
    download_name: String,
}

pub struct AppState<T: Transport> {
    converter: Converter<T>,
    /// Document of the latest run, if it succeeded. Held across a whole run
    /// so runs never overlap on the output file.
    last_run: Mutex<Option<Conversion>>,
}

impl<T: Transport> AppState<T> {
    pub fn new(converter: Converter<T>) -> Self {
        Self {
            converter,
            last_run: Mutex::new(None),
        }
    }

    fn download_name(&self) -> String {
        self.converter
            .options()
            .output_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_OUTPUT_FILE)
            .to_string()
    }
}

#[derive(Deserialize)]
struct CreateForm {
    url: String,
}

pub fn configure<T: Transport + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/create", web::post().to(create::<T>))
        .route("/download", web::get().to(download::<T>));
}

pub fn run<T: Transport + 'static>(
    listener: TcpListener,
    converter: Converter<T>,
) -> Result<Server, std::io::Error> {
    let state = Data::new(AppState::new(converter));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(configure::<T>)
    })
    .listen(listener)?
    .run();

    Ok(server)
}

fn render(template: IndexTemplate) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(e) => {
            error!("Failed to render page: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn index() -> HttpResponse {
    render(IndexTemplate::default())
}

async fn create<T: Transport + 'static>(
    state: Data<AppState<T>>,
    form: web::Form<CreateForm>,
) -> HttpResponse {
    let url = form.into_inner().url.trim().to_string();
    if url.is_empty() {
        return render(IndexTemplate {
            notice: Some("Please enter a URL.".to_string()),
            ..Default::default()
        });
    }

    let mut last_run = state.last_run.lock().await;
    // Only this run's document may be downloaded, even if it fails.
    *last_run = None;
    info!("Create requested for {}", url);

    match state.converter.run(&url).await {
        Ok(conversion) => {
            let page = IndexTemplate {
                success: Some(format!(
                    "PDF created successfully: {} ({} of {} pages)",
                    conversion.output_path().display(),
                    conversion.pages(),
                    conversion.attempted()
                )),
                warnings: conversion.warnings().iter().map(|w| w.to_string()).collect(),
                download_name: state.download_name(),
                url,
                ..Default::default()
            };
            *last_run = Some(conversion);
            render(page)
        }
        Err(e) => render(IndexTemplate {
            error: Some(e.to_string()),
            url,
            ..Default::default()
        }),
    }
}

async fn download<T: Transport + 'static>(state: Data<AppState<T>>) -> HttpResponse {
    let last_run = state.last_run.lock().await;
    let Some(conversion) = last_run.as_ref() else {
        return HttpResponse::NotFound().body("No PDF has been created yet.");
    };

    match conversion.read_document().await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("application/pdf")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(state.download_name())],
            })
            .body(bytes),
        Err(e) => {
            error!("{}", e);
            HttpResponse::InternalServerError().body(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConvertOptions, RequestHeaders};
    use crate::error::TransportError;
    use actix_web::{http::StatusCode, test};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;

    const PAGE: &str = "https://flip.example.com/";

    struct MapTransport(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl Transport for MapTransport {
        async fn get(&self, url: &str, _headers: &RequestHeaders) -> Result<Vec<u8>, TransportError> {
            self.0.get(url).cloned().ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    fn flipbook_site() -> MapTransport {
        let html = r#"<div class="ipgs-flipbook">
            <img data-ipgs-image="https://cdn.example.com/1.png">
            <img data-ipgs-image="https://cdn.example.com/missing.png">
        </div>"#;
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let mut map = HashMap::new();
        map.insert(PAGE.to_string(), html.as_bytes().to_vec());
        map.insert("https://cdn.example.com/1.png".to_string(), png);
        MapTransport(map)
    }

    fn state_in(dir: &tempfile::TempDir) -> Data<AppState<MapTransport>> {
        let options = ConvertOptions {
            output_path: dir.path().join("output.pdf"),
            ..ConvertOptions::default()
        };
        Data::new(AppState::new(Converter::with_transport(flipbook_site(), options)))
    }

    async fn body_text(resp: actix_web::dev::ServiceResponse) -> String {
        String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
    }

    #[actix_web::test]
    async fn form_is_served() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state_in(&dir))
                .configure(configure::<MapTransport>),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_text(resp).await;
        assert!(body.contains("IPGS Flipbook to PDF Converter"));
        assert!(body.contains("Create PDF"));
        assert!(!body.contains("Download PDF"));
    }

    #[actix_web::test]
    async fn blank_url_asks_for_one() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state_in(&dir))
                .configure(configure::<MapTransport>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create")
            .set_form([("url", "   ")])
            .to_request();
        let body = body_text(test::call_service(&app, req).await).await;
        assert!(body.contains("Please enter a URL."));
    }

    #[actix_web::test]
    async fn download_requires_a_successful_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state_in(&dir))
                .configure(configure::<MapTransport>),
        )
        .await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/create")
            .set_form([("url", "https://unknown.example.com/")])
            .to_request();
        let body = body_text(test::call_service(&app, req).await).await;
        assert!(body.contains("Error fetching webpage"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn failed_run_withdraws_previous_download() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state_in(&dir))
                .configure(configure::<MapTransport>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create")
            .set_form([("url", PAGE)])
            .to_request();
        let body = body_text(test::call_service(&app, req).await).await;
        assert!(body.contains("PDF created successfully"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/create")
            .set_form([("url", "https://unknown.example.com/")])
            .to_request();
        let body = body_text(test::call_service(&app, req).await).await;
        assert!(body.contains("Error fetching webpage"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn create_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state_in(&dir))
                .configure(configure::<MapTransport>),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create")
            .set_form([("url", PAGE)])
            .to_request();
        let body = body_text(test::call_service(&app, req).await).await;
        assert!(body.contains("PDF created successfully"));
        assert!(body.contains("(1 of 2 pages)"));
        assert!(body.contains("missing.png"));
        assert!(body.contains("Download PDF"));

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/download").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get("content-type").unwrap(),
            "application/pdf"
        );
        assert_eq!(
            resp.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"output.pdf\""
        );

        let bytes = test::read_body(resp).await;
        assert_eq!(bytes.as_ref(), std::fs::read(dir.path().join("output.pdf")).unwrap());
    }
}
