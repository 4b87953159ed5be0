//! Request metadata attached to every search.
//!
//! A [`RequestContext`] is built fresh for each session from three injected
//! capabilities:
//!
//! ```text
//! IdentityProvider ──▶ user_id, request_id
//! LocationProvider ──▶ GeoFix (only if permission granted)
//! caller           ──▶ extra fields (voice response, input language)
//! ```
//!
//! Once built it is only read: the backend serialises it into the
//! request-info JSON sent with the query.

pub mod identity;
pub mod location;

pub use identity::{IdentityError, IdentityProvider, InstallationIdentity, RequestId};
pub use location::{ConfiguredLocation, GeoFix, LocationProvider, NoLocation};

use serde_json::{Map, Value};

/// Metadata for one search request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    user_id: String,
    request_id: RequestId,
    location: Option<GeoFix>,
    extra: Map<String, Value>,
}

impl RequestContext {
    /// Build the context for a new session.
    ///
    /// The location permission is checked before the provider is asked for a
    /// fix; a denied permission silently leaves the position out.
    pub fn build(
        identity: &dyn IdentityProvider,
        location: &dyn LocationProvider,
        extra: Map<String, Value>,
    ) -> Self {
        let location = if location.permission_granted() {
            location.last_known_fix()
        } else {
            log::debug!("location permission not granted; sending request without position");
            None
        };

        Self {
            user_id: identity.stable_user_id(),
            request_id: identity.new_request_id(),
            location,
            extra,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn location(&self) -> Option<GeoFix> {
        self.location
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// The request-info JSON object understood by the search service.
    ///
    /// Extra fields never override the identity or position keys.
    pub fn to_request_info(&self) -> Value {
        let mut info = self.extra.clone();
        info.insert("UserID".into(), Value::from(self.user_id.clone()));
        info.insert("RequestID".into(), Value::from(self.request_id.to_string()));
        if let Some(fix) = self.location {
            info.insert("Latitude".into(), Value::from(fix.latitude));
            info.insert("Longitude".into(), Value::from(fix.longitude));
            info.insert("PositionHorizontalAccuracy".into(), Value::from(fix.accuracy_m));
        }
        Value::Object(info)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use serde_json::json;

    /// Grants permission and counts how often the fix is read.
    struct CountingLocation {
        granted: bool,
        reads: AtomicUsize,
    }

    impl LocationProvider for CountingLocation {
        fn permission_granted(&self) -> bool {
            self.granted
        }

        fn last_known_fix(&self) -> Option<GeoFix> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Some(GeoFix {
                latitude: 10.0,
                longitude: 20.0,
                accuracy_m: 5.0,
            })
        }
    }

    fn counting(granted: bool) -> CountingLocation {
        CountingLocation {
            granted,
            reads: AtomicUsize::new(0),
        }
    }

    #[test]
    fn denied_permission_skips_location_lookup() {
        let identity = InstallationIdentity::ephemeral("user-1");
        let location = counting(false);

        let ctx = RequestContext::build(&identity, &location, Map::new());

        assert!(ctx.location().is_none());
        assert_eq!(location.reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn granted_permission_attaches_fix() {
        let identity = InstallationIdentity::ephemeral("user-1");
        let location = counting(true);

        let ctx = RequestContext::build(&identity, &location, Map::new());

        assert_eq!(ctx.location().map(|f| f.latitude), Some(10.0));
        assert_eq!(location.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_context_gets_a_fresh_request_id() {
        let identity = InstallationIdentity::ephemeral("user-1");
        let a = RequestContext::build(&identity, &NoLocation, Map::new());
        let b = RequestContext::build(&identity, &NoLocation, Map::new());
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.user_id(), b.user_id());
    }

    #[test]
    fn request_info_contains_identity_position_and_extras() {
        let identity = InstallationIdentity::ephemeral("user-1");
        let mut extra = Map::new();
        extra.insert("InputLanguageIETFTag".into(), json!("en"));
        extra.insert("UserID".into(), json!("spoofed"));

        let ctx = RequestContext::build(&identity, &counting(true), extra);
        let info = ctx.to_request_info();

        assert_eq!(info["UserID"], "user-1");
        assert_eq!(info["RequestID"], ctx.request_id().to_string());
        assert_eq!(info["Latitude"], 10.0);
        assert_eq!(info["Longitude"], 20.0);
        assert_eq!(info["PositionHorizontalAccuracy"], 5.0);
        assert_eq!(info["InputLanguageIETFTag"], "en");
    }

    #[test]
    fn request_info_omits_position_without_fix() {
        let identity = InstallationIdentity::ephemeral("user-1");
        let info = RequestContext::build(&identity, &NoLocation, Map::new()).to_request_info();
        assert!(info.get("Latitude").is_none());
        assert!(info.get("PositionHorizontalAccuracy").is_none());
    }
}
