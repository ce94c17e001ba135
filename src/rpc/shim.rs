//! Subscription shim for request/response-only transports
//!
//! The hardware-wallet stack talks plain HTTP, which has no notion of
//! subscriptions. This layer answers `eth_subscribe` and `eth_unsubscribe`
//! locally and forwards everything else untouched. Confirmation tracking is
//! done by polling (see [`super::watcher`]), so nothing ever waits on the
//! synthetic subscription ids.

use alloy::rpc::json_rpc::{
    Id, RequestPacket, Response, ResponsePacket, ResponsePayload, SerializedRequest,
};
use alloy::transports::{TransportError, TransportFut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Event-source side of the shim: what callers may assume about
/// subscriptions on the wrapped transport
pub trait SubscriptionSource {
    /// Whether subscriptions deliver real notifications
    fn supports_subscriptions(&self) -> bool;

    /// Synthetic subscriptions handed out and not yet cancelled
    fn active_subscriptions(&self) -> usize;
}

#[derive(Debug, Default)]
struct SubscriptionState {
    next_id: AtomicU64,
    active: AtomicUsize,
}

/// Layer installing [`SubscriptionShim`] under an RPC client
#[derive(Debug, Clone, Default)]
pub struct SubscriptionShimLayer {
    state: Arc<SubscriptionState>,
}

impl<S> Layer<S> for SubscriptionShimLayer {
    type Service = SubscriptionShim<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SubscriptionShim {
            inner,
            state: self.state.clone(),
        }
    }
}

/// RPC middleware answering subscription calls locally
#[derive(Debug, Clone)]
pub struct SubscriptionShim<S> {
    inner: S,
    state: Arc<SubscriptionState>,
}

impl<S> SubscriptionSource for SubscriptionShim<S> {
    fn supports_subscriptions(&self) -> bool {
        false
    }

    fn active_subscriptions(&self) -> usize {
        self.state.active.load(Ordering::Relaxed)
    }
}

impl<S> SubscriptionShim<S> {
    /// Local response for subscription methods, `None` for everything else
    fn local_response(&self, request: &SerializedRequest) -> Option<Result<Response, TransportError>> {
        let payload = match request.method() {
            "eth_subscribe" => {
                let id = self.state.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                self.state.active.fetch_add(1, Ordering::Relaxed);
                serde_json::value::to_raw_value(&format!("{:#x}", id))
            }
            "eth_unsubscribe" => {
                let _ = self
                    .state
                    .active
                    .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
                serde_json::value::to_raw_value(&true)
            }
            _ => return None,
        };

        tracing::debug!("Answering {} locally", request.method());
        Some(
            payload
                .map(|raw| Response {
                    id: request.id().clone(),
                    payload: ResponsePayload::Success(raw),
                })
                .map_err(TransportError::ser_err),
        )
    }
}

impl<S> Service<RequestPacket> for SubscriptionShim<S>
where
    S: Service<
            RequestPacket,
            Response = ResponsePacket,
            Error = TransportError,
            Future = TransportFut<'static>,
        > + Send
        + 'static,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        match req {
            RequestPacket::Single(request) => match self.local_response(&request) {
                Some(response) => Box::pin(async move { response.map(ResponsePacket::Single) }),
                None => self.inner.call(RequestPacket::Single(request)),
            },
            RequestPacket::Batch(requests) => {
                let order: Vec<Id> = requests.iter().map(|r| r.id().clone()).collect();
                let mut local = Vec::new();
                let mut forwarded = Vec::new();
                for request in requests {
                    match self.local_response(&request) {
                        Some(Ok(response)) => local.push(response),
                        Some(Err(e)) => return Box::pin(async move { Err(e) }),
                        None => forwarded.push(request),
                    }
                }

                if forwarded.is_empty() {
                    return Box::pin(async move { Ok(ResponsePacket::Batch(local)) });
                }

                let remote = self.inner.call(RequestPacket::Batch(forwarded));
                Box::pin(async move {
                    let mut merged = local;
                    match remote.await? {
                        ResponsePacket::Single(response) => merged.push(response),
                        ResponsePacket::Batch(responses) => merged.extend(responses),
                    }
                    // Back into request order; unknown ids go last
                    merged.sort_by_key(|response| {
                        order
                            .iter()
                            .position(|id| *id == response.id)
                            .unwrap_or(order.len())
                    });
                    Ok(ResponsePacket::Batch(merged))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::Request;

    /// Answers every request with `"0x1"` and counts forwarded packets
    #[derive(Clone, Default)]
    struct EchoService {
        forwarded: Arc<AtomicUsize>,
    }

    fn ok(id: Id) -> Response {
        Response {
            id,
            payload: ResponsePayload::Success(serde_json::value::to_raw_value("0x1").unwrap()),
        }
    }

    impl Service<RequestPacket> for EchoService {
        type Response = ResponsePacket;
        type Error = TransportError;
        type Future = TransportFut<'static>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: RequestPacket) -> Self::Future {
            self.forwarded.fetch_add(1, Ordering::SeqCst);
            let packet = match req {
                RequestPacket::Single(r) => ResponsePacket::Single(ok(r.id().clone())),
                RequestPacket::Batch(rs) => {
                    ResponsePacket::Batch(rs.iter().map(|r| ok(r.id().clone())).collect())
                }
            };
            Box::pin(async move { Ok(packet) })
        }
    }

    fn request(method: &'static str, id: u64) -> SerializedRequest {
        Request::new(method, Id::Number(id), ()).serialize().unwrap()
    }

    fn success_body(response: &Response) -> String {
        match &response.payload {
            ResponsePayload::Success(raw) => raw.get().to_string(),
            ResponsePayload::Failure(e) => panic!("unexpected failure: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_subscribe_answered_locally() {
        let inner = EchoService::default();
        let forwarded = inner.forwarded.clone();
        let mut shim = SubscriptionShimLayer::default().layer(inner);

        let first = shim.call(RequestPacket::Single(request("eth_subscribe", 7))).await.unwrap();
        let second = shim.call(RequestPacket::Single(request("eth_subscribe", 8))).await.unwrap();

        let (ResponsePacket::Single(first), ResponsePacket::Single(second)) = (first, second) else {
            panic!("expected single responses");
        };
        assert_eq!(first.id, Id::Number(7));
        assert_ne!(success_body(&first), success_body(&second));
        assert_eq!(forwarded.load(Ordering::SeqCst), 0);
        assert_eq!(shim.active_subscriptions(), 2);
        assert!(!shim.supports_subscriptions());
    }

    #[tokio::test]
    async fn test_unsubscribe_answered_locally() {
        let mut shim = SubscriptionShimLayer::default().layer(EchoService::default());
        shim.call(RequestPacket::Single(request("eth_subscribe", 1))).await.unwrap();
        let resp = shim.call(RequestPacket::Single(request("eth_unsubscribe", 2))).await.unwrap();

        let ResponsePacket::Single(resp) = resp else {
            panic!("expected single response");
        };
        assert_eq!(success_body(&resp), "true");
        assert_eq!(shim.active_subscriptions(), 0);

        // Unbalanced unsubscribe does not underflow
        shim.call(RequestPacket::Single(request("eth_unsubscribe", 3))).await.unwrap();
        assert_eq!(shim.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_other_methods_are_forwarded() {
        let inner = EchoService::default();
        let forwarded = inner.forwarded.clone();
        let mut shim = SubscriptionShimLayer::default().layer(inner);

        let resp = shim.call(RequestPacket::Single(request("eth_chainId", 3))).await.unwrap();
        let ResponsePacket::Single(resp) = resp else {
            panic!("expected single response");
        };
        assert_eq!(success_body(&resp), "\"0x1\"");
        assert_eq!(forwarded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_is_split_and_merged() {
        let inner = EchoService::default();
        let forwarded = inner.forwarded.clone();
        let mut shim = SubscriptionShimLayer::default().layer(inner);

        let batch = RequestPacket::Batch(vec![
            request("eth_blockNumber", 1),
            request("eth_subscribe", 2),
            request("eth_chainId", 3),
        ]);
        let ResponsePacket::Batch(responses) = shim.call(batch).await.unwrap() else {
            panic!("expected batch response");
        };

        // Responses come back in request order, local answer in the middle
        let ids: Vec<u64> = responses
            .iter()
            .filter_map(|r| match r.id {
                Id::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(forwarded.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_of_only_subscriptions_stays_local() {
        let inner = EchoService::default();
        let forwarded = inner.forwarded.clone();
        let mut shim = SubscriptionShimLayer::default().layer(inner);

        let batch = RequestPacket::Batch(vec![request("eth_subscribe", 1), request("eth_unsubscribe", 2)]);
        let ResponsePacket::Batch(responses) = shim.call(batch).await.unwrap() else {
            panic!("expected batch response");
        };
        assert_eq!(responses.len(), 2);
        assert_eq!(forwarded.load(Ordering::SeqCst), 0);
    }
}
