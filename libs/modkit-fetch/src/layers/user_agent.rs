use crate::error::FetchError;
use http::{HeaderValue, Request, Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Sets `User-Agent` on requests that do not carry one
#[derive(Clone)]
pub struct UserAgentLayer {
    user_agent: HeaderValue,
}

impl UserAgentLayer {
    /// # Errors
    /// Returns `FetchError::InvalidHeaderValue` if `user_agent` is not a
    /// valid header value
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, FetchError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())?;
        Ok(Self { user_agent })
    }
}

impl<S> Layer<S> for UserAgentLayer {
    type Service = UserAgentService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UserAgentService {
            inner,
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Clone)]
pub struct UserAgentService<S> {
    inner: S,
    user_agent: HeaderValue,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for UserAgentService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        req.headers_mut()
            .entry(http::header::USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        self.inner.call(req)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Empty;
    use tower::ServiceExt;

    /// Echoes the User-Agent it received in the response header
    #[derive(Clone)]
    struct EchoUa;

    impl Service<Request<Empty<Bytes>>> for EchoUa {
        type Response = Response<()>;
        type Error = std::convert::Infallible;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Empty<Bytes>>) -> Self::Future {
            let mut response = Response::new(());
            if let Some(ua) = req.headers().get(http::header::USER_AGENT) {
                response
                    .headers_mut()
                    .insert(http::header::USER_AGENT, ua.clone());
            }
            std::future::ready(Ok(response))
        }
    }

    async fn echoed(req: Request<Empty<Bytes>>) -> Option<HeaderValue> {
        let service = UserAgentLayer::try_new("modkit-fetch/test").unwrap().layer(EchoUa);
        let response = service.oneshot(req).await.unwrap();
        response.headers().get(http::header::USER_AGENT).cloned()
    }

    #[tokio::test]
    async fn test_user_agent_added_when_absent() {
        let req = Request::new(Empty::new());
        assert_eq!(
            echoed(req).await,
            Some(HeaderValue::from_static("modkit-fetch/test"))
        );
    }

    #[tokio::test]
    async fn test_caller_user_agent_kept() {
        let req = Request::builder()
            .header(http::header::USER_AGENT, "custom-agent/2.0")
            .body(Empty::new())
            .unwrap();
        assert_eq!(
            echoed(req).await,
            Some(HeaderValue::from_static("custom-agent/2.0"))
        );
    }

    #[test]
    fn test_invalid_user_agent() {
        assert!(matches!(
            UserAgentLayer::try_new("invalid\x00agent"),
            Err(FetchError::InvalidHeaderValue(_))
        ));
    }
}
