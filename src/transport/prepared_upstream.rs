use http::header::{HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, COOKIE, USER_AGENT};
use http::HeaderMap;

use crate::config::{ConfigError, UpstreamConfig};
use crate::error::GatewayError;
use crate::translate::{ProjectedHistory, RequestContext};

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("sec-ch-ua-platform", "Windows"),
    (
        "sec-ch-ua",
        "\"Not(A:Brand\";v=\"99\", \"Microsoft Edge\";v=\"133\", \"Chromium\";v=\"133\"",
    ),
    ("sec-ch-ua-bitness", "64"),
    ("sec-ch-ua-model", ""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-arch", "x86"),
    ("sec-ch-ua-full-version", "133.0.3065.39"),
    ("sec-ch-ua-platform-version", "19.0.0"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-dest", "empty"),
];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0";

/// Cookie name that carries the caller's session token.
pub const SESSION_COOKIE: &str = "DS";

/// Cookies sent before the session token.
const LEADING_COOKIES: &[(&str, &str)] = &[
    ("guest_has_seen_legal_disclaimer", "true"),
    ("youchat_personalization", "true"),
];

/// Cookies sent after the session token.
const TRAILING_COOKIES: &[(&str, &str)] = &[
    ("you_subscription", "youpro_standard_year"),
    ("youpro_subscription", "true"),
    ("ai_model", "deepseek_r1"),
    ("youchat_smart_learn", "true"),
];

/// Fully built outbound request, ready for the transport.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: url::Url,
    pub headers: HeaderMap,
}

/// Upstream endpoint and static header bundle, parsed once at startup.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    endpoint: url::Url,
    market: String,
    safe_search: String,
    count: String,
    static_headers: HeaderMap,
}

impl PreparedUpstream {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the endpoint is not a valid URL.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, ConfigError> {
        let endpoint = url::Url::parse(&upstream.endpoint).map_err(|err| {
            ConfigError::Validation(format!(
                "upstream.endpoint '{}' is not a valid URL: {err}",
                upstream.endpoint
            ))
        })?;

        Ok(Self {
            endpoint,
            market: upstream.market.clone(),
            safe_search: upstream.safe_search.clone(),
            count: upstream.count.to_string(),
            static_headers: build_static_headers(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    /// Build the outbound query for one request.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Auth`] when the session token cannot be carried
    /// in a `Cookie` header.
    pub fn build_request(
        &self,
        ctx: &RequestContext,
        history: &ProjectedHistory,
        session_token: &str,
    ) -> Result<UpstreamRequest, GatewayError> {
        let chat = serde_json::to_string(&history.records)
            .map_err(|err| GatewayError::Internal(format!("history encode failed: {err}")))?;
        let past_chat_length = history.past_chat_length.to_string();

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", &history.query)
            .append_pair("page", "1")
            .append_pair("count", &self.count)
            .append_pair("safeSearch", &self.safe_search)
            .append_pair("mkt", &self.market)
            .append_pair("enable_worklow_generation_ux", "true")
            .append_pair("domain", "youchat")
            .append_pair("use_personalization_extraction", "true")
            .append_pair("pastChatLength", &past_chat_length)
            .append_pair("selectedChatMode", "custom")
            .append_pair("selectedAiModel", &ctx.model.upstream)
            .append_pair("enable_agent_clarification_questions", "true")
            .append_pair("use_nested_youchat_updates", "true")
            .append_pair("chat", &chat);

        let mut headers = self.static_headers.clone();
        let cookie =
            HeaderValue::from_str(&session_cookie(session_token)).map_err(|_| GatewayError::Auth)?;
        headers.insert(COOKIE, cookie);

        Ok(UpstreamRequest { url, headers })
    }
}

/// `Cookie` header value for an authenticated, personalised session.
#[must_use]
pub fn session_cookie(session_token: &str) -> String {
    let mut out = String::with_capacity(192 + session_token.len());
    let session = [(SESSION_COOKIE, session_token)];
    let pairs = LEADING_COOKIES
        .iter()
        .chain(session.iter())
        .chain(TRAILING_COOKIES.iter());
    for (index, (name, value)) in pairs.enumerate() {
        if index > 0 {
            out.push(';');
        }
        out.push_str(name);
        out.push('=');
        out.push_str(value);
    }
    out
}

fn build_static_headers() -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(STATIC_HEADERS.len() + 4);
    for (name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::chat::{ChatMessage, Role};
    use crate::protocol::mapping::ResolvedModel;
    use crate::translate::project_history;

    fn prepared() -> PreparedUpstream {
        PreparedUpstream::new(&UpstreamConfig::default()).unwrap()
    }

    fn ctx(upstream: &str) -> RequestContext {
        RequestContext::new(
            "chatcmpl-test".into(),
            1_700_000_000,
            ResolvedModel {
                upstream: upstream.into(),
                client: "gpt-4o".into(),
            },
            false,
        )
    }

    fn query_value(url: &url::Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn test_query_parameters() {
        let history = project_history(&[
            ChatMessage {
                role: Role::User,
                content: "Hi".into(),
            },
            ChatMessage {
                role: Role::Assistant,
                content: "Hello".into(),
            },
            ChatMessage {
                role: Role::User,
                content: "what & why?".into(),
            },
        ])
        .unwrap();
        let request = prepared()
            .build_request(&ctx("gpt_4o"), &history, "tok")
            .unwrap();

        let url = &request.url;
        assert_eq!(url.host_str(), Some("you.com"));
        assert_eq!(url.path(), "/api/streamingSearch");
        assert_eq!(query_value(url, "q").as_deref(), Some("what & why?"));
        assert_eq!(query_value(url, "page").as_deref(), Some("1"));
        assert_eq!(query_value(url, "count").as_deref(), Some("10"));
        assert_eq!(query_value(url, "safeSearch").as_deref(), Some("Moderate"));
        assert_eq!(query_value(url, "mkt").as_deref(), Some("zh-HK"));
        assert_eq!(query_value(url, "domain").as_deref(), Some("youchat"));
        assert_eq!(query_value(url, "pastChatLength").as_deref(), Some("2"));
        assert_eq!(query_value(url, "selectedChatMode").as_deref(), Some("custom"));
        assert_eq!(query_value(url, "selectedAiModel").as_deref(), Some("gpt_4o"));

        let chat: serde_json::Value =
            serde_json::from_str(&query_value(url, "chat").unwrap()).unwrap();
        assert_eq!(
            chat,
            serde_json::json!([
                {"question": "Hi", "answer": ""},
                {"question": "", "answer": "Hello"},
                {"question": "what & why?", "answer": ""}
            ])
        );
    }

    #[test]
    fn test_headers_and_cookie() {
        let history = project_history(&[ChatMessage {
            role: Role::User,
            content: "Hi".into(),
        }])
        .unwrap();
        let request = prepared()
            .build_request(&ctx("deepseek_v3"), &history, "session-abc")
            .unwrap();

        assert_eq!(request.headers[ACCEPT], "text/event-stream");
        assert_eq!(request.headers["sec-fetch-mode"], "cors");
        assert_eq!(request.headers["sec-ch-ua-model"], "");
        assert!(request.headers[USER_AGENT]
            .to_str()
            .unwrap()
            .contains("Edg/133"));

        let cookie = request.headers[COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("guest_has_seen_legal_disclaimer=true;"));
        assert!(cookie.contains(";DS=session-abc;"));
        assert!(cookie.ends_with("youchat_smart_learn=true"));
    }

    #[test]
    fn test_session_cookie_order() {
        assert_eq!(
            session_cookie("t"),
            "guest_has_seen_legal_disclaimer=true;youchat_personalization=true;DS=t;\
             you_subscription=youpro_standard_year;youpro_subscription=true;\
             ai_model=deepseek_r1;youchat_smart_learn=true"
        );
    }

    #[test]
    fn test_token_with_control_chars_is_rejected() {
        let history = project_history(&[ChatMessage {
            role: Role::User,
            content: "Hi".into(),
        }])
        .unwrap();
        let err = prepared()
            .build_request(&ctx("gpt_4o"), &history, "bad\ntoken")
            .unwrap_err();
        assert!(matches!(err, GatewayError::Auth));
    }

    #[test]
    fn test_custom_market() {
        let upstream = UpstreamConfig {
            market: "en-US".into(),
            count: 5,
            ..UpstreamConfig::default()
        };
        let history = project_history(&[ChatMessage {
            role: Role::User,
            content: "Hi".into(),
        }])
        .unwrap();
        let request = PreparedUpstream::new(&upstream)
            .unwrap()
            .build_request(&ctx("gpt_4o"), &history, "tok")
            .unwrap();
        assert_eq!(query_value(&request.url, "mkt").as_deref(), Some("en-US"));
        assert_eq!(query_value(&request.url, "count").as_deref(), Some("5"));
    }
}
