/// Batch translation of a document's bilingual rows
///
/// The provider is a caller-supplied [`Translator`]; this module only drives
/// it row by row, guards color codes and item references around each call,
/// and reports progress. Nothing here spawns threads or retries.
use crate::config::TranslatorConfig;
use crate::glossary::{Glossary, TermHint};
use crate::lang::{Lang, LangError};
use crate::protector::{skip_reason, Protector, ProtectorError, SkipReason};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("translator reported an error: {0}")]
    Failure(String),
    #[error("output lost protected tokens: {0}")]
    Guard(#[from] ProtectorError),
    #[error(transparent)]
    Lang(#[from] LangError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateOptions {
    pub source_lang: String,
    pub target_lang: String,
    /// Append `[--source--]` to every machine translation.
    #[serde(default)]
    pub keep_original: bool,
    /// Leave rows that already have a translation alone.
    #[serde(default)]
    pub only_untranslated: bool,
    /// Terms found in each text are handed to the provider with it.
    #[serde(skip)]
    pub glossary: Option<Arc<Glossary>>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self::from(&TranslatorConfig::default())
    }
}

impl From<&TranslatorConfig> for TranslateOptions {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            source_lang: config.languages.source_lang.clone(),
            target_lang: config.languages.target_lang.clone(),
            keep_original: config.back_fill.keep_original,
            only_untranslated: false,
            glossary: None,
        }
    }
}

pub trait Translator {
    fn name(&self) -> &str;

    fn translate_batch(
        &mut self,
        inputs: &[String],
        options: &TranslateOptions,
    ) -> Result<Vec<String>, TranslationError>;

    fn translate_one(
        &mut self,
        input: &str,
        options: &TranslateOptions,
    ) -> Result<String, TranslationError> {
        let outputs = self.translate_batch(&[input.to_string()], options)?;
        outputs
            .into_iter()
            .next()
            .ok_or_else(|| TranslationError::Failure(format!("{} returned no output", self.name())))
    }

    /// Single text plus the glossary entries it contains. Providers that
    /// cannot take hints fall back to [`translate_one`](Self::translate_one).
    fn translate_with_terms(
        &mut self,
        input: &str,
        _terms: &[TermHint],
        options: &TranslateOptions,
    ) -> Result<String, TranslationError> {
        self.translate_one(input, options)
    }
}

/// What happened to one text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum RowOutcome {
    Translated(String),
    /// Kept as source text.
    Skipped(SkipReason),
    /// Already translated, not sent.
    Unchanged,
    /// The provider's output broke a protected token; the row stays empty.
    Rejected(String),
}

/// Translate one text through the guard.
///
/// Skippable texts come back as `Skipped` without a provider call. A broken
/// color code or item reference is `Rejected`; provider errors propagate.
pub fn translate_text(
    translator: &mut dyn Translator,
    text: &str,
    options: &TranslateOptions,
) -> Result<RowOutcome, TranslationError> {
    if let Some(reason) = skip_reason(text) {
        return Ok(RowOutcome::Skipped(reason));
    }

    let terms = options
        .glossary
        .as_ref()
        .map(|glossary| glossary.find(text))
        .unwrap_or_default();
    let fragment = Protector::protect(text);
    let raw = translator.translate_with_terms(fragment.masked_text(), &terms, options)?;
    let restored = match fragment.restore(&raw) {
        Ok(restored) => restored,
        Err(err) => return Ok(RowOutcome::Rejected(err.to_string())),
    };

    if options.keep_original {
        Ok(RowOutcome::Translated(format!("{}[--{}--]", restored, text)))
    } else {
        Ok(RowOutcome::Translated(restored))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress<'a> {
    /// 1-based.
    pub index: usize,
    pub total: usize,
    /// Source characters processed so far.
    pub chars: usize,
    pub key: &'a str,
    pub source: &'a str,
    pub outcome: &'a RowOutcome,
}

impl BatchProgress<'_> {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.index as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub translated: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub chars: usize,
    pub cancelled: bool,
}

/// Translate every row of `lang` in order.
///
/// Translated and skipped rows get their text through
/// [`Lang::set_translation`] (skipped rows get the source text). The callback
/// sees each row after it is stored; returning `Break` stops the batch with
/// the rows done so far kept. A provider error stops the batch the same way
/// and is returned.
pub fn translate_lang<F>(
    lang: &mut Lang,
    translator: &mut dyn Translator,
    options: &TranslateOptions,
    mut on_progress: F,
) -> Result<BatchSummary, TranslationError>
where
    F: FnMut(&BatchProgress<'_>) -> ControlFlow<()>,
{
    let total = lang.len();
    let mut summary = BatchSummary::default();
    log::info!(
        "translating {} rows with {} ({} -> {})",
        total,
        translator.name(),
        options.source_lang,
        options.target_lang
    );

    for index in 0..total {
        let (key, source, already) = {
            let record = &lang.records()[index];
            (record.key.clone(), record.source.clone(), record.is_translated())
        };
        summary.chars += source.chars().count();

        let outcome = if options.only_untranslated && already {
            RowOutcome::Unchanged
        } else {
            translate_text(translator, &source, options)?
        };

        match &outcome {
            RowOutcome::Translated(text) => {
                lang.set_translation(index, text.clone())?;
                summary.translated += 1;
            }
            RowOutcome::Skipped(reason) => {
                log::debug!("{} kept as source: text {}", key, reason.describe());
                lang.set_translation(index, source.clone())?;
                summary.skipped += 1;
            }
            RowOutcome::Unchanged => {
                lang.keep_cached(index)?;
                summary.unchanged += 1;
            }
            RowOutcome::Rejected(reason) => {
                log::warn!("{} left untranslated: {}", key, reason);
                summary.rejected += 1;
            }
        }

        let progress = BatchProgress {
            index: index + 1,
            total,
            chars: summary.chars,
            key: &key,
            source: &source,
            outcome: &outcome,
        };
        if on_progress(&progress).is_break() {
            log::info!("translation stopped after {} of {} rows", index + 1, total);
            summary.cancelled = true;
            break;
        }
    }

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::formats::lang_file::KeyMap;
    use crate::lang::LangSource;

    /// Upper-cases ASCII and tags the target language.
    pub(crate) struct ShoutTranslator {
        pub calls: usize,
        pub fail_on: Option<String>,
    }

    impl ShoutTranslator {
        pub(crate) fn new() -> Self {
            Self {
                calls: 0,
                fail_on: None,
            }
        }
    }

    impl Translator for ShoutTranslator {
        fn name(&self) -> &str {
            "shout"
        }

        fn translate_batch(
            &mut self,
            inputs: &[String],
            options: &TranslateOptions,
        ) -> Result<Vec<String>, TranslationError> {
            self.calls += 1;
            inputs
                .iter()
                .map(|input| {
                    if self.fail_on.as_deref() == Some(input.as_str()) {
                        return Err(TranslationError::Failure("quota exceeded".into()));
                    }
                    Ok(format!("{}:{}", options.target_lang, input.to_uppercase()))
                })
                .collect()
        }
    }

    /// Drops every marker it is given.
    struct LossyTranslator;

    impl Translator for LossyTranslator {
        fn name(&self) -> &str {
            "lossy"
        }

        fn translate_batch(
            &mut self,
            inputs: &[String],
            _options: &TranslateOptions,
        ) -> Result<Vec<String>, TranslationError> {
            Ok(inputs.iter().map(|_| "没有标记".to_string()).collect())
        }
    }

    fn lang(pairs: &[(&str, &str)]) -> Lang {
        let map: KeyMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Lang::load(LangSource::FromMemory(map)).unwrap()
    }

    #[test]
    fn translates_through_the_guard() {
        let mut translator = ShoutTranslator::new();
        let options = TranslateOptions::default();
        let outcome = translate_text(&mut translator, "&aget #minecraft:logs", &options).unwrap();
        // markers are upper-case already, so they survive the round trip
        assert_eq!(outcome, RowOutcome::Translated("zh:&aGET #minecraft:logs".into()));
    }

    #[test]
    fn keep_original_appends_source() {
        let mut translator = ShoutTranslator::new();
        let options = TranslateOptions {
            keep_original: true,
            ..TranslateOptions::default()
        };
        let outcome = translate_text(&mut translator, "hi", &options).unwrap();
        assert_eq!(outcome, RowOutcome::Translated("zh:HI[--hi--]".into()));
    }

    #[test]
    fn skips_without_calling_the_provider() {
        let mut translator = ShoutTranslator::new();
        let outcome =
            translate_text(&mut translator, "{image:a.png}", &TranslateOptions::default()).unwrap();
        assert_eq!(outcome, RowOutcome::Skipped(SkipReason::Image));
        assert_eq!(translator.calls, 0);
    }

    #[test]
    fn batch_fills_rows_and_reports_progress() {
        let mut lang = lang(&[("a", "one"), ("b", "see https://x.io"), ("c", "three")]);
        let mut translator = ShoutTranslator::new();
        let mut seen = Vec::new();
        let summary = translate_lang(&mut lang, &mut translator, &TranslateOptions::default(), |p| {
            seen.push((p.index, p.total, p.chars));
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(seen, vec![(1, 3, 3), (2, 3, 19), (3, 3, 24)]);
        assert_eq!(summary.translated, 2);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.cancelled);
        assert_eq!(lang.records()[0].pending_translation, "zh:ONE");
        assert_eq!(lang.records()[0].cached_translation, "zh:ONE");
        assert_eq!(lang.records()[1].pending_translation, "see https://x.io");
    }

    #[test]
    fn callback_can_stop_the_batch() {
        let mut lang = lang(&[("a", "one"), ("b", "two")]);
        let mut translator = ShoutTranslator::new();
        let summary = translate_lang(&mut lang, &mut translator, &TranslateOptions::default(), |_| {
            ControlFlow::Break(())
        })
        .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.translated, 1);
        assert!(!lang.records()[1].is_translated());
    }

    #[test]
    fn provider_error_stops_and_keeps_done_rows() {
        let mut lang = lang(&[("a", "one"), ("b", "two"), ("c", "three")]);
        let mut translator = ShoutTranslator::new();
        translator.fail_on = Some("two".into());
        let result = translate_lang(&mut lang, &mut translator, &TranslateOptions::default(), |_| {
            ControlFlow::Continue(())
        });
        assert!(matches!(result, Err(TranslationError::Failure(_))));
        assert!(lang.records()[0].is_translated());
        assert!(!lang.records()[2].is_translated());
    }

    #[test]
    fn lost_markers_leave_the_row_untranslated() {
        let mut lang = lang(&[("a", "&cRed")]);
        let summary = translate_lang(
            &mut lang,
            &mut LossyTranslator,
            &TranslateOptions::default(),
            |_| ControlFlow::Continue(()),
        )
        .unwrap();
        assert_eq!(summary.rejected, 1);
        assert!(!lang.records()[0].is_translated());
    }

    #[test]
    fn only_untranslated_skips_done_rows() {
        let mut lang = lang(&[("a", "one"), ("b", "two")]);
        lang.edit("a", "一").unwrap();
        let mut translator = ShoutTranslator::new();
        let options = TranslateOptions {
            only_untranslated: true,
            ..TranslateOptions::default()
        };
        let summary =
            translate_lang(&mut lang, &mut translator, &options, |_| ControlFlow::Continue(()))
                .unwrap();
        assert_eq!(summary.unchanged, 1);
        assert_eq!(translator.calls, 1);
        assert_eq!(lang.records()[0].effective_translation(), "一");
    }

    /// Records the hints it is given and answers with the first translation.
    struct TermTranslator {
        seen: Vec<Vec<String>>,
    }

    impl Translator for TermTranslator {
        fn name(&self) -> &str {
            "terms"
        }

        fn translate_batch(
            &mut self,
            inputs: &[String],
            _options: &TranslateOptions,
        ) -> Result<Vec<String>, TranslationError> {
            Ok(inputs.to_vec())
        }

        fn translate_with_terms(
            &mut self,
            input: &str,
            terms: &[TermHint],
            _options: &TranslateOptions,
        ) -> Result<String, TranslationError> {
            self.seen.push(terms.iter().map(|hint| hint.term.clone()).collect());
            Ok(terms
                .first()
                .and_then(|hint| hint.translations.first().cloned())
                .unwrap_or_else(|| input.to_string()))
        }
    }

    #[test]
    fn glossary_terms_reach_the_provider() {
        let mut terms = indexmap::IndexMap::new();
        terms.insert("Nether Star".to_string(), vec!["下界之星".to_string()]);
        terms.insert("Nether".to_string(), vec!["下界".to_string()]);
        let options = TranslateOptions {
            glossary: Some(Arc::new(Glossary::new(terms).unwrap())),
            ..TranslateOptions::default()
        };

        let mut translator = TermTranslator { seen: Vec::new() };
        let outcome = translate_text(&mut translator, "A nether star", &options).unwrap();
        assert_eq!(outcome, RowOutcome::Translated("下界之星".into()));
        translate_text(&mut translator, "Plain text", &options).unwrap();
        assert_eq!(
            translator.seen,
            vec![vec!["nether star".to_string(), "nether".to_string()], Vec::new()]
        );

        // providers without hint support still work
        let mut plain = ShoutTranslator::new();
        let outcome = translate_text(&mut plain, "nether", &options).unwrap();
        assert_eq!(outcome, RowOutcome::Translated("zh:NETHER".into()));
    }

    #[test]
    fn unchanged_rows_stay_pending() {
        let mut lang = lang(&[("a", "one")]);
        lang.set_translation(0, "一").unwrap();
        lang.edit("a", "").unwrap();
        let options = TranslateOptions {
            only_untranslated: true,
            ..TranslateOptions::default()
        };
        translate_lang(&mut lang, &mut ShoutTranslator::new(), &options, |_| {
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(lang.records()[0].pending_translation, "一");
    }
}
