use crate::http::{ChainStep, RequestContext, RequestDescriptor};
use crate::i18n::LocaleResolver;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT_LANGUAGE};
use std::sync::Arc;
use tracing::debug;

/// Tells the server which language to answer in.
pub struct LocaleAugmenter {
    locale: Arc<LocaleResolver>,
}

impl LocaleAugmenter {
    pub fn new(locale: Arc<LocaleResolver>) -> Self {
        Self { locale }
    }
}

#[async_trait]
impl ChainStep for LocaleAugmenter {
    fn name(&self) -> &'static str {
        "locale-augmenter"
    }

    fn transform_request(&self, request: RequestDescriptor, ctx: &RequestContext) -> RequestDescriptor {
        // An explicit caller choice wins
        if request.headers().contains_key(ACCEPT_LANGUAGE) {
            return request;
        }

        let locale = self.locale.current();
        match HeaderValue::from_str(locale.tag()) {
            Ok(value) => {
                debug!(request_id = ctx.request_id(), locale = %locale, "attaching Accept-Language");
                request.header(ACCEPT_LANGUAGE, value)
            }
            Err(_) => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{AcceptLanguage, Locale};
    use crate::storage::MemoryStorage;

    fn step() -> (LocaleAugmenter, Arc<LocaleResolver>) {
        let resolver = Arc::new(LocaleResolver::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(AcceptLanguage::default()),
            Locale::default_locale(),
        ));
        (LocaleAugmenter::new(resolver.clone()), resolver)
    }

    #[test]
    fn test_sets_current_locale() {
        let (step, resolver) = step();
        resolver.set("fr").unwrap();
        let ctx = RequestContext::for_test(RequestDescriptor::get("/"));

        let request = step.transform_request(RequestDescriptor::get("/"), &ctx);
        assert_eq!(request.headers()[ACCEPT_LANGUAGE], "fr");
    }

    #[test]
    fn test_follows_locale_changes() {
        let (step, resolver) = step();
        let ctx = RequestContext::for_test(RequestDescriptor::get("/"));

        let before = step.transform_request(RequestDescriptor::get("/"), &ctx);
        resolver.set("en-GB").unwrap();
        let after = step.transform_request(RequestDescriptor::get("/"), &ctx);

        assert_eq!(before.headers()[ACCEPT_LANGUAGE], "en");
        assert_eq!(after.headers()[ACCEPT_LANGUAGE], "en-GB");
    }

    #[test]
    fn test_keeps_caller_header() {
        let (step, _resolver) = step();
        let ctx = RequestContext::for_test(RequestDescriptor::get("/"));
        let request = RequestDescriptor::get("/").header(ACCEPT_LANGUAGE, HeaderValue::from_static("es"));

        let request = step.transform_request(request, &ctx);
        assert_eq!(request.headers()[ACCEPT_LANGUAGE], "es");
    }
}
