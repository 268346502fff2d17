/// Per-request context made available to handlers via request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}
