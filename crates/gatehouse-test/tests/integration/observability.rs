use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use salvo::http::{Method, StatusCode};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

use gatehouse_test::TestApp;

#[derive(Default)]
struct SpanFields(BTreeMap<&'static str, String>);

impl Visit for SpanFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name(), format!("{value:?}"));
    }
}

/// For every `login_info` span, remembers the `(user_id, tenant_id)` carried by an enclosing
/// span when it was opened.
#[derive(Clone, Default)]
struct EnclosingIdentity {
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl<S> Layer<S> for EnclosingIdentity
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = SpanFields::default();
        attrs.record(&mut fields);
        span.extensions_mut().insert(fields);

        if attrs.metadata().name() != "login_info" {
            return;
        }
        for ancestor in span.scope().skip(1) {
            let extensions = ancestor.extensions();
            let Some(fields) = extensions.get::<SpanFields>() else {
                continue;
            };
            if let (Some(user_id), Some(tenant_id)) =
                (fields.0.get("user_id"), fields.0.get("tenant_id"))
            {
                self.seen
                    .lock()
                    .unwrap()
                    .push((user_id.clone(), tenant_id.clone()));
            }
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(fields) = span.extensions_mut().get_mut::<SpanFields>() {
                values.record(fields);
            }
        }
    }
}

#[tokio::test]
async fn handlers_run_inside_a_span_carrying_the_caller() {
    let capture = EnclosingIdentity::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::start().await;
    let token = app.login("bob", "bob-pw").await;
    capture.seen.lock().unwrap().clear();

    app.call(Method::GET, "/api/v1/pub/current/user")
        .bearer(&token)
        .send()
        .await
        .assert_status(StatusCode::OK);

    let seen = capture.seen.lock().unwrap().clone();
    assert!(
        seen.contains(&("bob".to_string(), "acme".to_string())),
        "identity missing from enclosing spans: {seen:?}"
    );
}
