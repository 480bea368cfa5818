use crate::http::FailureKind;
use crate::i18n::Locale;

/// All localized user-facing alert strings for a locale.
#[derive(Debug, Clone)]
pub struct AlertStrings {
    // ==================== Failure Messages ====================
    /// No response was received (offline, DNS, timeout)
    pub network: &'static str,

    /// The request was rejected as invalid (4xx other than 401/403)
    pub client: &'static str,

    /// Authenticated but not allowed (403)
    pub forbidden: &'static str,

    /// Session missing or expired (401)
    pub unauthenticated: &'static str,

    /// The server failed (5xx)
    pub server: &'static str,

    /// Anything that does not fit the categories above
    pub unknown: &'static str,
}

// ==================== English Strings ====================

/// English strings (default, also used for en-GB)
pub const ENGLISH_STRINGS: AlertStrings = AlertStrings {
    network: "Server not reachable. Check your connection and try again.",
    client: "The request could not be processed.",
    forbidden: "You are not allowed to access this resource.",
    unauthenticated: "Your session has expired. Please sign in again.",
    server: "The server encountered an error. Please try again later.",
    unknown: "An unexpected error occurred.",
};

// ==================== Spanish Strings ====================

pub const SPANISH_STRINGS: AlertStrings = AlertStrings {
    network: "No se puede contactar con el servidor. Revisa tu conexión e inténtalo de nuevo.",
    client: "No se ha podido procesar la solicitud.",
    forbidden: "No tienes permiso para acceder a este recurso.",
    unauthenticated: "Tu sesión ha caducado. Vuelve a iniciar sesión.",
    server: "El servidor ha sufrido un error. Inténtalo más tarde.",
    unknown: "Se ha producido un error inesperado.",
};

// ==================== French Strings ====================

pub const FRENCH_STRINGS: AlertStrings = AlertStrings {
    network: "Serveur injoignable. Vérifiez votre connexion et réessayez.",
    client: "La requête n'a pas pu être traitée.",
    forbidden: "Vous n'êtes pas autorisé à accéder à cette ressource.",
    unauthenticated: "Votre session a expiré. Veuillez vous reconnecter.",
    server: "Le serveur a rencontré une erreur. Veuillez réessayer plus tard.",
    unknown: "Une erreur inattendue s'est produite.",
};

impl AlertStrings {
    /// Strings for a locale, chosen by primary language.
    ///
    /// Languages without a translation get English.
    pub fn for_locale(locale: Locale) -> &'static AlertStrings {
        match locale.language() {
            "es" => &SPANISH_STRINGS,
            "fr" => &FRENCH_STRINGS,
            _ => &ENGLISH_STRINGS,
        }
    }

    /// Message for a failure classification.
    pub fn failure(&self, kind: FailureKind) -> &'static str {
        match kind {
            FailureKind::Network => self.network,
            FailureKind::Client => self.client,
            FailureKind::Forbidden => self.forbidden,
            FailureKind::Unauthenticated => self.unauthenticated,
            FailureKind::Server => self.server,
            FailureKind::Unknown => self.unknown,
        }
    }
}
