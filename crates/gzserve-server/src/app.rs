//! Router construction.
//!
//! Mounts one file server per configured prefix and the optional landing
//! page.

use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::{any, get};
use gzserve_config::MountConfig;
use gzserve_storage::Storage;
use html_escape::{encode_double_quoted_attribute, encode_text};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::ServerConfig;
use crate::handler;
use crate::state::Mount;

/// Create the application router.
///
/// # Arguments
///
/// * `config` - Server configuration (mounts must already be validated)
/// * `storage` - Store shared by all mounts
pub(crate) fn create_router(config: &ServerConfig, storage: &Arc<dyn Storage>) -> Router {
    let mut router = Router::new();

    for mount in &config.mounts {
        router = router.merge(mount_router(Mount {
            prefix: mount.prefix.clone(),
            storage: Arc::clone(storage),
            gzip: mount.gzip,
        }));
    }

    if config.index_page {
        let page = landing_page(&config.mounts);
        router = router.route(
            "/",
            get(move || {
                let page = page.clone();
                async move { Html(page) }
            }),
        );
    }

    router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Routes for a single mount: the bare prefix, its root and everything below.
pub(crate) fn mount_router(mount: Mount) -> Router {
    let prefix = mount.prefix.clone();
    let state = Arc::new(mount);

    if prefix.is_empty() {
        return Router::new().fallback(handler::serve).with_state(state);
    }

    Router::new()
        .route(&prefix, any(handler::serve))
        .route(&format!("{prefix}/"), any(handler::serve))
        .route(&format!("{prefix}/{{*path}}"), any(handler::serve))
        .with_state(state)
}

/// HTML page linking to every mount.
fn landing_page(mounts: &[MountConfig]) -> String {
    let mut links = String::new();
    for mount in mounts {
        let target = format!("{}/", mount.prefix);
        let kind = if mount.gzip {
            "gzipped files"
        } else {
            "raw files"
        };
        links.push_str(&format!(
            "<a href=\"{}\">{}: {kind}</a><br>\n",
            encode_double_quoted_attribute(&target),
            encode_text(&target)
        ));
    }

    format!(
        "<html><head><title>Index</title></head>\n<body>\n{links}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use gzserve_storage::MockStorage;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use super::*;

    const GZ_BYTES: &[u8] = &[0x1f, 0x8b, 0x08];

    fn config() -> ServerConfig {
        ServerConfig {
            mounts: MountConfig::defaults(),
            index_page: true,
            ..ServerConfig::default()
        }
    }

    fn storage() -> Arc<dyn Storage> {
        Arc::new(
            MockStorage::new()
                .with_file("/app.js", "let a = 1;", 100)
                .with_file("/app.js.gz", GZ_BYTES, 100),
        )
    }

    async fn send(router: Router, uri: &str) -> axum::response::Response {
        let request = Request::builder()
            .uri(uri)
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        router.oneshot(request).await.unwrap()
    }

    #[test]
    fn test_landing_page_lists_mounts() {
        let page = landing_page(&MountConfig::defaults());

        assert!(page.contains("<a href=\"/dir/\">/dir/: raw files</a><br>"));
        assert!(page.contains("<a href=\"/gzip/\">/gzip/: gzipped files</a><br>"));
    }

    #[tokio::test]
    async fn test_landing_page_route() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("/gzip/"));
    }

    #[tokio::test]
    async fn test_landing_page_disabled() {
        let config = ServerConfig {
            index_page: false,
            ..config()
        };
        let router = create_router(&config, &storage());

        let response = send(router, "/").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gzip_mount_negotiates() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/gzip/app.js").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    }

    #[tokio::test]
    async fn test_plain_mount_ignores_gzip_variants() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/dir/app.js").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    }

    #[tokio::test]
    async fn test_bare_prefix_redirects_to_mount_root() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/gzip").await;

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "gzip/");
    }

    #[tokio::test]
    async fn test_mount_root_lists_store() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/dir/").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("<a href=\"app.js.gz\">"));
    }

    #[tokio::test]
    async fn test_unmounted_path_is_not_found() {
        let router = create_router(&config(), &storage());

        let response = send(router, "/other/app.js").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
