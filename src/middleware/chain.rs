use super::{Flow, Middleware, Outcome};
use crate::http::Request;
use std::future::Future;
use std::sync::Arc;

/// The ordered middleware list, built once at startup.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new(layers: Vec<Arc<dyn Middleware>>) -> Self {
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Run the chain around `terminal`.
    ///
    /// A middleware counts as entered once its pre-phase returned
    /// [`Flow::Continue`]. Post-phases run for entered middleware only, in
    /// reverse, whether the inner outcome is a response, a short-circuit
    /// or an error. The terminal receives a copy of the request; the
    /// original is handed back for the post-phases and error mapping.
    pub async fn invoke<F, Fut>(&self, mut request: Request, terminal: F) -> (Request, Outcome)
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let mut entered = 0;
        let mut early = None;
        for layer in &self.layers {
            match layer.before(&mut request).await {
                Ok(Flow::Continue) => entered += 1,
                Ok(Flow::Respond(response)) => {
                    tracing::debug!("Middleware {} answered early", layer.name());
                    early = Some(Ok(response));
                    break;
                }
                Err(e) => {
                    tracing::debug!("Middleware {} rejected the request: {}", layer.name(), e);
                    early = Some(Err(e));
                    break;
                }
            }
        }

        let mut outcome = match early {
            Some(outcome) => outcome,
            None => terminal(request.clone()).await,
        };

        for layer in self.layers[..entered].iter().rev() {
            outcome = layer.after(&request, outcome).await;
        }
        (request, outcome)
    }
}
