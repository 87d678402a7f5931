//! 翻译服务边界
//!
//! 定义对象安全的 `TranslateProvider` trait 与基于 HTTP 的默认实现。
//! 所有请求在出站前做边界校验：空列表、超过单次上限、语言代码
//! 缺失都以结构化错误拒绝，不会打到网络。

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::config::{constants, PipelineConfig};
use crate::error::{TranslateError, TranslateResult};

/// 一条翻译结果：原文与译文的对应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatedPair {
    pub original: String,
    pub translated: String,
}

/// 翻译服务抽象
///
/// 返回 `BoxFuture` 保持对象安全，管道与调度器都以
/// `Arc<dyn TranslateProvider>` 注入依赖。
///
/// 契约：成功时必须返回与输入等长、顺序一致的结果列表。
/// 数量对不上的实现会被调度器当作批次失败处理。
pub trait TranslateProvider: Send + Sync {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslateResult<Vec<TranslatedPair>>>;
}

/// 出站前的边界校验
pub fn validate_request(
    texts: &[String],
    source_lang: &str,
    target_lang: &str,
    max_items: usize,
) -> TranslateResult<()> {
    if texts.is_empty() {
        return Err(TranslateError::InvalidInput("文本列表为空".to_string()));
    }
    if texts.len() > max_items {
        return Err(TranslateError::InvalidInput(format!(
            "单次请求文本数 {} 超过上限 {}",
            texts.len(),
            max_items
        )));
    }
    if source_lang.is_empty() || target_lang.is_empty() {
        return Err(TranslateError::InvalidInput("语言代码缺失".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    texts: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    success: bool,
    #[serde(default)]
    data: Vec<TranslatedPair>,
    #[serde(default)]
    error: Option<String>,
}

/// 基于 reqwest 的 HTTP 翻译服务客户端
pub struct HttpProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    async fn request(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> TranslateResult<Vec<TranslatedPair>> {
        validate_request(texts, source_lang, target_lang, constants::MAX_TEXTS_PER_REQUEST)?;

        // 凭证缺失按请求粒度报配置错误，调度器对其余批次继续
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TranslateError::Config("未配置 API 密钥".to_string()))?;

        tracing::debug!(
            "发起翻译请求: {} 条文本, {} -> {}",
            texts.len(),
            source_lang,
            target_lang
        );

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(&WireRequest {
                texts,
                source_lang,
                target_lang,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslateError::Provider(format!(
                "翻译服务返回状态 {}",
                response.status()
            )));
        }

        let body: WireResponse = response.json().await?;
        parse_response(body, texts.len())
    }
}

fn parse_response(body: WireResponse, expected: usize) -> TranslateResult<Vec<TranslatedPair>> {
    if !body.success {
        return Err(TranslateError::Provider(
            body.error.unwrap_or_else(|| "未知服务错误".to_string()),
        ));
    }
    if body.data.len() != expected {
        return Err(TranslateError::Provider(format!(
            "结果数量不匹配: 期望 {}, 实际 {}",
            expected,
            body.data.len()
        )));
    }
    Ok(body.data)
}

impl TranslateProvider for HttpProvider {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslateResult<Vec<TranslatedPair>>> {
        Box::pin(self.request(texts, source_lang, target_lang))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_list() {
        let err = validate_request(&[], "en", "ko", 50).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_rejects_oversized_list() {
        let texts: Vec<String> = (0..51).map(|i| format!("t{}", i)).collect();
        let err = validate_request(&texts, "en", "ko", 50).unwrap_err();
        assert!(matches!(err, TranslateError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_requires_language_codes() {
        let texts = vec!["Hello".to_string()];
        assert!(validate_request(&texts, "", "ko", 50).is_err());
        assert!(validate_request(&texts, "en", "", 50).is_err());
        assert!(validate_request(&texts, "en", "ko", 50).is_ok());
    }

    #[test]
    fn test_parse_success_response() {
        let body: WireResponse = serde_json::from_str(
            r#"{"success": true, "data": [{"original": "Hello", "translated": "안녕"}]}"#,
        )
        .unwrap();
        let pairs = parse_response(body, 1).unwrap();
        assert_eq!(pairs[0].translated, "안녕");
    }

    #[test]
    fn test_parse_failure_response() {
        let body: WireResponse = serde_json::from_str(
            r#"{"success": false, "error": "quota exceeded"}"#,
        )
        .unwrap();
        let err = parse_response(body, 1).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_parse_rejects_count_mismatch() {
        let body: WireResponse = serde_json::from_str(
            r#"{"success": true, "data": [{"original": "a", "translated": "b"}]}"#,
        )
        .unwrap();
        let err = parse_response(body, 2).unwrap_err();
        assert!(matches!(err, TranslateError::Provider(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let provider = HttpProvider::new(&PipelineConfig::default());
        let texts = vec!["Hello".to_string()];
        let err = provider.translate(&texts, "en", "ko").await.unwrap_err();
        assert!(matches!(err, TranslateError::Config(_)));
    }
}
