//! Server-sent events binding of the live event channel.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderName, header},
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use futures::StreamExt;

use crate::app::ControlPlane;

/// Subscribe to the hub; the observer is removed when the client goes away.
///
/// Keep-alives come from the hub heartbeat, not from axum.
pub async fn events(State(plane): State<Arc<ControlPlane>>) -> impl IntoResponse {
    let subscription = plane.subscribe();
    tracing::info!(observer = %subscription.id(), "Event stream opened");

    let stream = subscription
        .into_stream()
        .map(|frame| Ok::<Event, Infallible>(frame.to_sse_event()));

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, BodyDataStream},
        http::Request,
    };
    use farmctl_core::Event as HubEvent;
    use farmctl_login::LoginStatus;
    use tower::ServiceExt;

    use super::*;
    use crate::{app::tests::fixture, http::router};

    async fn next_chunk(body: &mut BodyDataStream) -> String {
        let data = body.next().await.unwrap().unwrap();
        String::from_utf8(data.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_primes_then_follows_hub() {
        let f = fixture(vec![LoginStatus::Wait]);
        let app = router(Arc::clone(&f.plane));

        let response = app
            .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache, no-transform");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let mut body = response.into_body().into_data_stream();
        assert!(next_chunk(&mut body).await.contains(r#""type":"stateSnapshot""#));
        assert!(next_chunk(&mut body).await.contains(r#""type":"statsUpdated""#));

        f.hub.heartbeat();
        let heartbeat = next_chunk(&mut body).await;
        assert!(heartbeat.starts_with(':') && heartbeat.contains("heartbeat"));
        assert!(!heartbeat.contains("data:"));

        f.hub.publish(HubEvent::LandsChanged { count: 2 });
        let chunk = next_chunk(&mut body).await;
        assert!(chunk.starts_with("data: "));
        assert!(chunk.contains(r#"{"type":"landsChanged","data":{"count":2}}"#));

        drop(body);
        tokio::task::yield_now().await;
        assert_eq!(f.hub.observer_count(), 0);
    }
}
