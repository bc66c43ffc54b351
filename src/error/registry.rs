//! Registry of error kinds keyed by HTTP status code.
//!
//! Each kind owns a stable `message_id`. Ids are part of the public contract:
//! callers branch on them, so an id is never moved to another kind. New
//! statuses are added by appending a constant and a row in [`REGISTRY`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// One entry of the error taxonomy.
///
/// Kinds compare and hash by `message_id` only.
#[derive(Debug, Clone, Copy)]
pub struct ErrorKind {
    /// Status code the kind is registered under.
    pub code: u16,
    /// Stable short identifier, e.g. `HTTP-28140`.
    pub message_id: &'static str,
    /// Type-like name, e.g. `NotFound`.
    pub name: &'static str,
    /// Standard reason phrase, used when no message is supplied.
    pub reason: &'static str,
}

impl ErrorKind {
    const fn new(
        code: u16,
        message_id: &'static str,
        name: &'static str,
        reason: &'static str,
    ) -> Self {
        Self {
            code,
            message_id,
            name,
            reason,
        }
    }

    /// Fallback for status codes missing from the registry.
    pub const UNKNOWN: ErrorKind = ErrorKind::new(0, "ERR-19036", "Error", "Unknown Error");

    pub const MULTIPLE_CHOICES: ErrorKind =
        ErrorKind::new(300, "HTTP-42445", "MultipleChoices", "Multiple Choices");
    pub const MOVED_PERMANENTLY: ErrorKind =
        ErrorKind::new(301, "HTTP-30785", "MovedPermanently", "Moved Permanently");
    pub const FOUND: ErrorKind = ErrorKind::new(302, "HTTP-19772", "Found", "Found");
    pub const SEE_OTHER: ErrorKind = ErrorKind::new(303, "HTTP-51750", "SeeOther", "See Other");
    pub const NOT_MODIFIED: ErrorKind =
        ErrorKind::new(304, "HTTP-85319", "NotModified", "Not Modified");
    pub const USE_PROXY: ErrorKind = ErrorKind::new(305, "HTTP-06328", "UseProxy", "Use Proxy");
    pub const SWITCH_PROXY: ErrorKind =
        ErrorKind::new(306, "HTTP-09494", "SwitchProxy", "Switch Proxy");
    pub const TEMPORARY_REDIRECT: ErrorKind =
        ErrorKind::new(307, "HTTP-70239", "TemporaryRedirect", "Temporary Redirect");
    pub const PERMANENT_REDIRECT: ErrorKind =
        ErrorKind::new(308, "HTTP-12337", "PermanentRedirect", "Permanent Redirect");
    pub const BAD_REQUEST: ErrorKind =
        ErrorKind::new(400, "HTTP-47931", "BadRequest", "Bad Request");
    pub const UNAUTHORIZED: ErrorKind =
        ErrorKind::new(401, "HTTP-76387", "Unauthorized", "Unauthorized");
    pub const PAYMENT_REQUIRED: ErrorKind =
        ErrorKind::new(402, "HTTP-07602", "PaymentRequired", "Payment Required");
    pub const FORBIDDEN: ErrorKind = ErrorKind::new(403, "HTTP-66510", "Forbidden", "Forbidden");
    pub const NOT_FOUND: ErrorKind = ErrorKind::new(404, "HTTP-28140", "NotFound", "Not Found");
    pub const METHOD_NOT_ALLOWED: ErrorKind =
        ErrorKind::new(405, "HTTP-04914", "MethodNotAllowed", "Method Not Allowed");
    pub const NOT_ACCEPTABLE: ErrorKind =
        ErrorKind::new(406, "HTTP-11265", "NotAcceptable", "Not Acceptable");
    pub const PROXY_AUTHENTICATION_REQUIRED: ErrorKind =
        ErrorKind::new(407, "HTTP-56838", "ProxyAuthenticationRequired", "Proxy Authentication Required");
    pub const REQUEST_TIMEOUT: ErrorKind =
        ErrorKind::new(408, "HTTP-54810", "RequestTimeout", "Request Timeout");
    pub const CONFLICT: ErrorKind = ErrorKind::new(409, "HTTP-09156", "Conflict", "Conflict");
    pub const GONE: ErrorKind = ErrorKind::new(410, "HTTP-31544", "Gone", "Gone");
    pub const LENGTH_REQUIRED: ErrorKind =
        ErrorKind::new(411, "HTTP-11889", "LengthRequired", "Length Required");
    pub const PRECONDITION_FAILED: ErrorKind =
        ErrorKind::new(412, "HTTP-72226", "PreconditionFailed", "Precondition Failed");
    pub const PAYLOAD_TOO_LARGE: ErrorKind =
        ErrorKind::new(413, "HTTP-55642", "PayloadTooLarge", "Payload Too Large");
    pub const URI_TOO_LONG: ErrorKind =
        ErrorKind::new(414, "HTTP-07747", "UriTooLong", "URI Too Long");
    pub const UNSUPPORTED_MEDIA_TYPE: ErrorKind =
        ErrorKind::new(415, "HTTP-74115", "UnsupportedMediaType", "Unsupported Media Type");
    pub const RANGE_NOT_SATISFIABLE: ErrorKind =
        ErrorKind::new(416, "HTTP-16226", "RangeNotSatisfiable", "Range Not Satisfiable");
    pub const EXPECTATION_FAILED: ErrorKind =
        ErrorKind::new(417, "HTTP-29260", "ExpectationFailed", "Expectation Failed");
    pub const IM_A_TEAPOT: ErrorKind =
        ErrorKind::new(418, "HTTP-82657", "ImATeapot", "I'm a teapot");
    pub const MISDIRECTED_REQUEST: ErrorKind =
        ErrorKind::new(421, "HTTP-24099", "MisdirectedRequest", "Misdirected Request");
    pub const UNPROCESSABLE_ENTITY: ErrorKind =
        ErrorKind::new(422, "HTTP-82238", "UnprocessableEntity", "Unprocessable Entity");
    pub const LOCKED: ErrorKind = ErrorKind::new(423, "HTTP-76414", "Locked", "Locked");
    pub const FAILED_DEPENDENCY: ErrorKind =
        ErrorKind::new(424, "HTTP-08108", "FailedDependency", "Failed Dependency");
    pub const TOO_EARLY: ErrorKind = ErrorKind::new(425, "HTTP-75642", "TooEarly", "Too Early");
    pub const UPGRADE_REQUIRED: ErrorKind =
        ErrorKind::new(426, "HTTP-76748", "UpgradeRequired", "Upgrade Required");
    pub const PRECONDITION_REQUIRED: ErrorKind =
        ErrorKind::new(428, "HTTP-51993", "PreconditionRequired", "Precondition Required");
    pub const TOO_MANY_REQUESTS: ErrorKind =
        ErrorKind::new(429, "HTTP-06499", "TooManyRequests", "Too Many Requests");
    pub const REQUEST_HEADER_FIELDS_TOO_LARGE: ErrorKind =
        ErrorKind::new(431, "HTTP-28977", "RequestHeaderFieldsTooLarge", "Request Header Fields Too Large");
    pub const UNAVAILABLE_FOR_LEGAL_REASONS: ErrorKind =
        ErrorKind::new(451, "HTTP-06105", "UnavailableForLegalReasons", "Unavailable For Legal Reasons");
    pub const INTERNAL_SERVER_ERROR: ErrorKind =
        ErrorKind::new(500, "HTTP-02752", "InternalServerError", "Internal Server Error");
    pub const NOT_IMPLEMENTED: ErrorKind =
        ErrorKind::new(501, "HTTP-72963", "NotImplemented", "Not Implemented");
    pub const BAD_GATEWAY: ErrorKind =
        ErrorKind::new(502, "HTTP-17455", "BadGateway", "Bad Gateway");
    pub const SERVICE_UNAVAILABLE: ErrorKind =
        ErrorKind::new(503, "HTTP-37959", "ServiceUnavailable", "Service Unavailable");
    pub const GATEWAY_TIMEOUT: ErrorKind =
        ErrorKind::new(504, "HTTP-54937", "GatewayTimeout", "Gateway Timeout");
    pub const HTTP_VERSION_NOT_SUPPORTED: ErrorKind =
        ErrorKind::new(505, "HTTP-18907", "HttpVersionNotSupported", "HTTP Version Not Supported");
    pub const VARIANT_ALSO_NEGOTIATES: ErrorKind =
        ErrorKind::new(506, "HTTP-70868", "VariantAlsoNegotiates", "Variant Also Negotiates");
    pub const INSUFFICIENT_STORAGE: ErrorKind =
        ErrorKind::new(507, "HTTP-15439", "InsufficientStorage", "Insufficient Storage");
    pub const LOOP_DETECTED: ErrorKind =
        ErrorKind::new(508, "HTTP-74830", "LoopDetected", "Loop Detected");
    pub const NOT_EXTENDED: ErrorKind =
        ErrorKind::new(510, "HTTP-40433", "NotExtended", "Not Extended");
    pub const NETWORK_AUTHENTICATION_REQUIRED: ErrorKind =
        ErrorKind::new(511, "HTTP-73434", "NetworkAuthenticationRequired", "Network Authentication Required");

    /// Returns the registered kind for `code`, if any.
    pub fn lookup(code: u16) -> Option<ErrorKind> {
        REGISTRY
            .binary_search_by_key(&code, |kind| kind.code)
            .ok()
            .map(|idx| REGISTRY[idx])
    }

    /// Resolves a kind from its message id. The fallback kind resolves too.
    pub fn from_message_id(message_id: &str) -> Option<ErrorKind> {
        if message_id == Self::UNKNOWN.message_id {
            return Some(Self::UNKNOWN);
        }
        REGISTRY
            .iter()
            .find(|kind| kind.message_id == message_id)
            .copied()
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.message_id.hash(state);
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.message_id)
    }
}

impl FromStr for ErrorKind {
    type Err = anyhow::Error;

    /// Accepts a message id (`HTTP-02752`), a status code (`500`) or a kind
    /// name (`InternalServerError`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(kind) = ErrorKind::from_message_id(s) {
            return Ok(kind);
        }
        if let Ok(code) = s.parse::<u16>() {
            return ErrorKind::lookup(code)
                .ok_or_else(|| anyhow::anyhow!("No error kind registered for status {}", code));
        }
        REGISTRY
            .iter()
            .find(|kind| kind.name.eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown error kind '{}'", s))
    }
}

/// Every registered kind, sorted by status code.
pub static REGISTRY: &[ErrorKind] = &[
    ErrorKind::MULTIPLE_CHOICES,
    ErrorKind::MOVED_PERMANENTLY,
    ErrorKind::FOUND,
    ErrorKind::SEE_OTHER,
    ErrorKind::NOT_MODIFIED,
    ErrorKind::USE_PROXY,
    ErrorKind::SWITCH_PROXY,
    ErrorKind::TEMPORARY_REDIRECT,
    ErrorKind::PERMANENT_REDIRECT,
    ErrorKind::BAD_REQUEST,
    ErrorKind::UNAUTHORIZED,
    ErrorKind::PAYMENT_REQUIRED,
    ErrorKind::FORBIDDEN,
    ErrorKind::NOT_FOUND,
    ErrorKind::METHOD_NOT_ALLOWED,
    ErrorKind::NOT_ACCEPTABLE,
    ErrorKind::PROXY_AUTHENTICATION_REQUIRED,
    ErrorKind::REQUEST_TIMEOUT,
    ErrorKind::CONFLICT,
    ErrorKind::GONE,
    ErrorKind::LENGTH_REQUIRED,
    ErrorKind::PRECONDITION_FAILED,
    ErrorKind::PAYLOAD_TOO_LARGE,
    ErrorKind::URI_TOO_LONG,
    ErrorKind::UNSUPPORTED_MEDIA_TYPE,
    ErrorKind::RANGE_NOT_SATISFIABLE,
    ErrorKind::EXPECTATION_FAILED,
    ErrorKind::IM_A_TEAPOT,
    ErrorKind::MISDIRECTED_REQUEST,
    ErrorKind::UNPROCESSABLE_ENTITY,
    ErrorKind::LOCKED,
    ErrorKind::FAILED_DEPENDENCY,
    ErrorKind::TOO_EARLY,
    ErrorKind::UPGRADE_REQUIRED,
    ErrorKind::PRECONDITION_REQUIRED,
    ErrorKind::TOO_MANY_REQUESTS,
    ErrorKind::REQUEST_HEADER_FIELDS_TOO_LARGE,
    ErrorKind::UNAVAILABLE_FOR_LEGAL_REASONS,
    ErrorKind::INTERNAL_SERVER_ERROR,
    ErrorKind::NOT_IMPLEMENTED,
    ErrorKind::BAD_GATEWAY,
    ErrorKind::SERVICE_UNAVAILABLE,
    ErrorKind::GATEWAY_TIMEOUT,
    ErrorKind::HTTP_VERSION_NOT_SUPPORTED,
    ErrorKind::VARIANT_ALSO_NEGOTIATES,
    ErrorKind::INSUFFICIENT_STORAGE,
    ErrorKind::LOOP_DETECTED,
    ErrorKind::NOT_EXTENDED,
    ErrorKind::NETWORK_AUTHENTICATION_REQUIRED,
];

/// Maps a status code to its error kind.
///
/// Returns `None` for success codes (below 300). Codes at or above 300 that
/// are not registered map to [`ErrorKind::UNKNOWN`].
pub fn classify_status(code: u16) -> Option<ErrorKind> {
    if code < 300 {
        return None;
    }
    Some(ErrorKind::lookup(code).unwrap_or(ErrorKind::UNKNOWN))
}
