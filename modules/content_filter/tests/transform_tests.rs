//! Integration tests for on-demand transforms, fail-open behaviour and caching

mod common;

use common::{
    field, options, CountingTransformer, FailingTransformer, PanickingTransformer, TestHost,
};
use content_filter::config::Config;
use content_filter::contract::*;
use content_filter::ContentFilterApi;
use serde_json::json;
use std::sync::Arc;

const SAMPLE: &str = "<p>Hello <strong>world</strong>!</p>";

#[tokio::test]
async fn test_strip_all_with_site_defaults() {
    let host = TestHost::single_site();
    let service = host.service();

    let outcome = service.transform_on_demand(SAMPLE, None, None).await;
    assert_eq!(outcome.filtered, "Hello world!");
    assert_eq!(outcome.mode, FilterMode::StripAll);
}

#[tokio::test]
async fn test_forced_markdown_mode() {
    let host = TestHost::single_site();
    let service = host.service();

    let outcome = service
        .transform_on_demand(
            "<h2>Title</h2><p>Hello <strong>world</strong>!</p>",
            Some(FilterMode::Markdown),
            None,
        )
        .await;
    assert_eq!(outcome.mode, FilterMode::Markdown);
    assert!(outcome.filtered.contains("## Title"), "{}", outcome.filtered);
    assert!(outcome.filtered.contains("**world**"), "{}", outcome.filtered);
}

#[tokio::test]
async fn test_overlay_selects_custom_allowlist() {
    let host = TestHost::single_site();
    let service = host.service();
    let overlay = options(&[
        ("filter_mode", json!("custom")),
        ("custom_allowed_tags", json!("p,strong")),
    ]);

    let outcome = service
        .transform_on_demand(
            "<p>Hello <strong>world</strong>! <script>alert('x')</script></p>",
            None,
            Some(&overlay),
        )
        .await;
    assert_eq!(outcome.mode, FilterMode::Custom);
    assert!(outcome.filtered.contains("<strong>world</strong>"));
    assert!(!outcome.filtered.contains("script"));
}

#[tokio::test]
async fn test_none_mode_passes_content_through() {
    let host = TestHost::single_site();
    let service = host.service();

    let outcome = service
        .transform_on_demand(SAMPLE, Some(FilterMode::None), None)
        .await;
    assert_eq!(outcome.filtered, SAMPLE);
}

#[tokio::test]
async fn test_transformer_error_returns_original() {
    let host = TestHost::single_site();
    let service = host.service_with_transformer(&Config::default(), Arc::new(FailingTransformer));

    let outcome = service.transform_on_demand(SAMPLE, None, None).await;
    assert_eq!(outcome.filtered, SAMPLE);
}

#[tokio::test]
async fn test_transformer_panic_returns_original() {
    let host = TestHost::single_site();
    let service =
        host.service_with_transformer(&Config::default(), Arc::new(PanickingTransformer));

    let outcome = service
        .transform_on_demand(SAMPLE, Some(FilterMode::Markdown), None)
        .await;
    assert_eq!(outcome.filtered, SAMPLE);

    let scope = service.begin_request();
    let value = service
        .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!(SAMPLE)), &scope)
        .await;
    assert_eq!(value, json!(SAMPLE));
}

#[tokio::test]
async fn test_oversized_input_passes_through() {
    let host = TestHost::single_site();
    let config = Config {
        max_input_bytes: 16,
        ..Config::default()
    };
    let service = host.service_with(&config);

    let outcome = service.transform_on_demand(SAMPLE, None, None).await;
    assert_eq!(outcome.filtered, SAMPLE);
}

#[tokio::test]
async fn test_repeated_field_is_served_from_cache() {
    let host = TestHost::single_site();
    let counter = Arc::new(CountingTransformer::default());
    let service = host.service_with_transformer(&Config::default(), counter.clone());

    let scope = service.begin_request();
    for _ in 0..3 {
        let value = service
            .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!(SAMPLE)), &scope)
            .await;
        assert_eq!(value, json!("Hello world!"));
    }

    assert_eq!(counter.calls(), 1);
    let stats = service.cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_disabled_cache_transforms_every_time() {
    let host = TestHost::single_site();
    let counter = Arc::new(CountingTransformer::default());
    let service = host.service_with_transformer(&Config::default(), counter.clone());
    service
        .update_site_options(1, options(&[("enable_cache", json!(false))]), OverrideMap::new())
        .await
        .unwrap();

    let scope = service.begin_request();
    for _ in 0..2 {
        service
            .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!(SAMPLE)), &scope)
            .await;
    }
    assert_eq!(counter.calls(), 2);
    assert_eq!(service.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_settings_write_invalidates_cached_transforms() {
    let host = TestHost::single_site();
    let service = host.service();
    let scope = service.begin_request();

    service
        .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!(SAMPLE)), &scope)
        .await;
    assert_eq!(service.cache_stats().entries, 1);

    service
        .update_site_options(1, options(&[("filter_mode", json!("markdown"))]), OverrideMap::new())
        .await
        .unwrap();
    assert_eq!(service.cache_stats().entries, 0);

    let value = service
        .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!(SAMPLE)), &scope)
        .await;
    assert_eq!(value, json!("Hello **world**!"));
}

#[tokio::test]
async fn test_post_update_clears_only_that_post() {
    let host = TestHost::single_site();
    let service = host.service();
    let scope = service.begin_request();

    service
        .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!("<p>ten</p>")), &scope)
        .await;
    service
        .intercept(ApiSurface::Rest, field(11, ContentFieldName::Content, json!("<p>eleven</p>")), &scope)
        .await;
    assert_eq!(service.cache_stats().entries, 2);

    assert_eq!(service.on_post_updated(10).await, 1);
    assert_eq!(service.cache_stats().entries, 1);
    assert_eq!(service.clear_cache().await, 1);
    assert_eq!(service.cache_stats().entries, 0);
}

#[tokio::test]
async fn test_circuit_breaker_per_request() {
    let host = TestHost::single_site();
    let config = Config {
        transform_ceiling: 2,
        ..Config::default()
    };
    let service = host.service_with(&config);

    let scope = service.begin_request();
    let mut values = Vec::new();
    for n in 0..3 {
        let raw = json!(format!("<b>{n}</b>"));
        values.push(
            service
                .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, raw), &scope)
                .await,
        );
    }
    assert_eq!(values, vec![json!("0"), json!("1"), json!("<b>2</b>")]);
    assert!(scope.is_tripped());

    let next = service.begin_request();
    let value = service
        .intercept(ApiSurface::Rest, field(10, ContentFieldName::Content, json!("<b>3</b>")), &next)
        .await;
    assert_eq!(value, json!("3"));
}

#[tokio::test]
async fn test_native_client_delegates_to_service() {
    let host = TestHost::single_site();
    let client = content_filter::api::native::NativeClient::new(host.service());

    assert_eq!(client.transform(SAMPLE, None).await, "Hello world!");
    let effective = client.get_effective_options(1).await;
    assert_eq!(effective.filter.filter_mode, FilterMode::StripAll);
    assert_eq!(client.clear_cache().await, 0);
    assert_eq!(client.cache_stats().entries, 0);
}
