//! soonsite/crates/soon-api/src/middleware.rs Middleware
//!
//! Access logging and security headers.

use actix_web::middleware::{DefaultHeaders, Logger};

// Returns the access logger for the SoonSite front.
pub fn standard_middleware() -> Logger {
    // remote-ip "request-line" status-code response-size "referrer" "user-agent" time
    Logger::default()
}

// Pages are server rendered with inline styles only; nothing is loaded cross-origin.
pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((
            "Content-Security-Policy",
            "default-src 'self'; style-src 'self' 'unsafe-inline'; frame-ancestors 'none'",
        ))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("X-Frame-Options", "DENY"))
}
