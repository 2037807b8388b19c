use std::cell::RefCell;
use std::io::Cursor;

use super::*;
use crate::foundation::core::Canvas;

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([9, 8, 7, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn proxied_hosts_match_exactly_or_as_subdomain() {
    let proxy = ProxyConfig::default();
    assert!(proxy.requires_proxy(
        "https://oaidalleapiprodscus.blob.core.windows.net/private/img.png?sig=1"
    ));
    assert!(proxy.requires_proxy("https://cdn.bfl.ai/x.png"));
    assert!(proxy.requires_proxy("https://BFL.AI/x.png"));
    assert!(!proxy.requires_proxy("https://notbfl.ai/x.png"));
    assert!(!proxy.requires_proxy("https://example.com/bfl.ai.png"));
    assert!(!proxy.requires_proxy("/local/path.png"));
    assert!(!proxy.requires_proxy("data:image/png;base64,AAAA"));
}

#[test]
fn proxy_rewrite_percent_encodes_original_url() {
    let proxy = ProxyConfig {
        proxy_path: "/api/proxy-image".to_owned(),
        hosts: vec!["img.example".to_owned()],
    };
    assert_eq!(
        proxy.resolve_fetch_url("https://img.example/a b.png?x=1&y=2"),
        "/api/proxy-image?url=https%3A%2F%2Fimg.example%2Fa+b.png%3Fx%3D1%26y%3D2"
    );
    assert_eq!(
        proxy.resolve_fetch_url("https://other.example/a.png"),
        "https://other.example/a.png"
    );
}

#[test]
fn data_uris_decode_inline() {
    assert_eq!(
        decode_data_uri("data:text/plain;base64,aGVsbG8=").unwrap(),
        b"hello"
    );
    assert!(decode_data_uri("data:text/plain,hello").is_err());
    assert!(decode_data_uri("data:image/png;base64").is_err());
    assert!(decode_data_uri("https://x").is_err());
}

#[test]
fn remote_import_fetches_through_proxy() {
    let seen = RefCell::new(Vec::new());
    let bytes = png_bytes(4, 2);
    let fetcher = |url: &str| -> anyhow::Result<Vec<u8>> {
        seen.borrow_mut().push(url.to_owned());
        Ok(bytes.clone())
    };
    let mut reg = LayerRegistry::new(Canvas::default());
    let id = import_remote(
        &mut reg,
        &fetcher,
        &ProxyConfig::default(),
        "https://cdn.bfl.ai/gen.png",
        None,
    )
    .unwrap();

    assert_eq!(reg.surface(id).unwrap().dimensions(), (4, 2));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].starts_with("/api/proxy-image?url=https%3A%2F%2Fcdn.bfl.ai"));
}

#[test]
fn data_uri_import_skips_fetcher() {
    let fetcher = |_: &str| -> anyhow::Result<Vec<u8>> { anyhow::bail!("network disabled") };
    let uri = format!("data:image/png;base64,{}", Base64::encode_string(&png_bytes(3, 3)));
    let mut reg = LayerRegistry::new(Canvas::default());
    let id = import_remote(&mut reg, &fetcher, &ProxyConfig::default(), &uri, Some("inline"))
        .unwrap();
    assert_eq!(reg.layer(id).unwrap().name, "inline");
}

#[test]
fn fetch_and_decode_failures_leave_registry_unchanged() {
    let mut reg = LayerRegistry::new(Canvas::default());
    let offline = |_: &str| -> anyhow::Result<Vec<u8>> { anyhow::bail!("connection refused") };
    let err = import_remote(
        &mut reg,
        &offline,
        &ProxyConfig::default(),
        "https://example.com/a.png",
        None,
    )
    .unwrap_err();
    let CanvasError::Other(inner) = err else {
        panic!("expected wrapped fetch error");
    };
    assert!(format!("{inner:#}").contains("connection refused"));

    let garbage = |_: &str| -> anyhow::Result<Vec<u8>> { Ok(b"<html>".to_vec()) };
    let err = import_remote(
        &mut reg,
        &garbage,
        &ProxyConfig::default(),
        "https://example.com/a.png",
        None,
    )
    .unwrap_err();
    assert!(matches!(err, CanvasError::Decode(_)));
    assert!(reg.is_empty());
}
