use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use warp::http::HeaderMap;

/// Extractor for HTTP headers that implements OpenTelemetry's Extractor trait
struct HeaderExtractor<'a>(&'a HeaderMap);

impl opentelemetry::propagation::Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Link `span` to the caller's trace when the request carries a W3C
/// `traceparent` header.
///
/// Requests without trace headers keep the fresh trace id the
/// OpenTelemetry layer assigned to the span.
pub fn set_parent_from_headers(span: &Span, headers: &HeaderMap) {
    let parent_context = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(headers))
    });
    span.set_parent(parent_context);
}
