use http_client_instrumented::HttpClientInstrumented;
use load_tunnel_runner::prelude::UserValuesConstraint;

/// HTTP specific agent context values.
#[derive(Default, Debug)]
pub struct HttpAgentContext {
    pub(crate) client: Option<HttpClientInstrumented>,
}

impl UserValuesConstraint for HttpAgentContext {}

impl HttpAgentContext {
    /// The agent's HTTP client. Fails if [crate::prelude::create_http_client] was not called in
    /// the agent setup.
    pub fn client(&self) -> anyhow::Result<&HttpClientInstrumented> {
        self.client.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "HTTP client is not set, did you forget to call `create_http_client` in your agent setup?"
            )
        })
    }
}
