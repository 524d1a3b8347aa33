//! Generator trait: the external backend the queue drives

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::GenerationOutput;
use crate::error::GenerationError;

/// External async generation backend for one media kind
///
/// The queue treats implementations as opaque: it hands over the prompt and
/// the request's metadata untouched, and routes whatever comes back to the
/// request's callbacks. Timeouts and retries belong in the implementation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, metadata: Option<&Value>) -> Result<GenerationOutput, GenerationError>;
}

/// Generator backed by an async closure
pub struct FnGenerator<F> {
    func: F,
}

/// Wrap an async closure as a [`Generator`]
///
/// The closure receives owned copies of the prompt and metadata so the
/// returned future can be `'static`.
pub fn generator_fn<F, Fut>(func: F) -> FnGenerator<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GenerationOutput, GenerationError>> + Send + 'static,
{
    FnGenerator { func }
}

#[async_trait]
impl<F, Fut> Generator for FnGenerator<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<GenerationOutput, GenerationError>> + Send + 'static,
{
    async fn generate(&self, prompt: &str, metadata: Option<&Value>) -> Result<GenerationOutput, GenerationError> {
        (self.func)(prompt.to_string(), metadata.cloned()).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ImageAsset, MediaKind};

    #[tokio::test]
    async fn test_generator_fn_passes_prompt_and_metadata() {
        let generator = generator_fn(|prompt: String, metadata: Option<Value>| async move {
            let suffix = metadata.map(|m| m.to_string()).unwrap_or_default();
            Ok::<_, GenerationError>(GenerationOutput::Image(ImageAsset {
                uri: format!("{}{}", prompt, suffix),
                mime_type: "image/png".to_string(),
            }))
        });

        let meta = serde_json::json!(7);
        let output = generator.generate("cat", Some(&meta)).await.unwrap();
        assert_eq!(output.uri(), "cat7");
        assert_eq!(output.kind(), MediaKind::Image);
    }

    #[tokio::test]
    async fn test_generator_fn_error() {
        let generator =
            generator_fn(|_prompt: String, _metadata: Option<Value>| async {
            Err::<GenerationOutput, _>(GenerationError::failed("nope"))
        });
        let err = generator.generate("cat", None).await.unwrap_err();
        assert_eq!(err, GenerationError::Failed("nope".to_string()));
    }
}
