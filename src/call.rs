use std::fmt;

/// The four RPC call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Unary,
    ServerStreaming,
    ClientStreaming,
    BidiStreaming,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallKind::Unary => "unary",
            CallKind::ServerStreaming => "server-streaming",
            CallKind::ClientStreaming => "client-streaming",
            CallKind::BidiStreaming => "bidi-streaming",
        };
        f.write_str(name)
    }
}

/// Immutable description of one invocation: which method, which shape.
///
/// Created fresh per call and handed to every interceptor along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallDescriptor {
    pub service: &'static str,
    pub method: &'static str,
    pub kind: CallKind,
}

impl CallDescriptor {
    pub const fn new(service: &'static str, method: &'static str, kind: CallKind) -> Self {
        Self {
            service,
            method,
            kind,
        }
    }

    /// Full gRPC request path, `/{service}/{method}`.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.service, self.method, self.kind)
    }
}
