use std::fmt;

use tracing::{debug, info};

use crate::error::{Result, SubweaveError};
use crate::subtitle::{LanguageCode, SubtitleDocument};
use super::TranslationBackend;

/// One hop of a translation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationLeg {
    pub from: LanguageCode,
    pub to: LanguageCode,
}

impl TranslationLeg {
    pub fn new(from: &LanguageCode, to: &LanguageCode) -> Self {
        Self {
            from: from.clone(),
            to: to.clone(),
        }
    }

    fn unavailable(&self, reason: impl fmt::Display) -> SubweaveError {
        SubweaveError::TranslationRouteUnavailable {
            from: self.from.to_string(),
            to: self.to.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A direct leg, or two legs chained through the intermediate language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationPlan {
    Direct(TranslationLeg),
    Pivot([TranslationLeg; 2]),
}

impl TranslationPlan {
    pub fn legs(&self) -> &[TranslationLeg] {
        match self {
            TranslationPlan::Direct(leg) => std::slice::from_ref(leg),
            TranslationPlan::Pivot(legs) => legs,
        }
    }
}

impl fmt::Display for TranslationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legs = self.legs();
        write!(f, "{}", legs[0].from)?;
        for leg in legs {
            write!(f, " -> {}", leg.to)?;
        }
        Ok(())
    }
}

/// Routes a document through a backend, falling back to one pivot language
/// when the backend has no direct resource for the pair.
pub struct TranslationRouter {
    backend: Box<dyn TranslationBackend>,
    intermediate: LanguageCode,
}

impl TranslationRouter {
    pub fn new(backend: Box<dyn TranslationBackend>, intermediate: LanguageCode) -> Self {
        Self { backend, intermediate }
    }

    pub fn intermediate(&self) -> &LanguageCode {
        &self.intermediate
    }

    async fn leg_available(&self, leg: &TranslationLeg) -> Result<bool> {
        let available = self
            .backend
            .has_resource(&leg.from, &leg.to)
            .await
            .map_err(|e| leg.unavailable(e))?;
        debug!(
            "{} resource {} -> {}: {}",
            self.backend.name(),
            leg.from,
            leg.to,
            if available { "available" } else { "missing" }
        );
        Ok(available)
    }

    /// Pick a plan. Every leg is checked before anything is translated.
    pub async fn plan(&self, from: &LanguageCode, to: &LanguageCode) -> Result<TranslationPlan> {
        let direct = TranslationLeg::new(from, to);
        if self.leg_available(&direct).await? {
            return Ok(TranslationPlan::Direct(direct));
        }

        let no_route = || SubweaveError::NoTranslationRoute {
            from: from.to_string(),
            to: to.to_string(),
        };
        if *from == self.intermediate || *to == self.intermediate {
            return Err(no_route());
        }

        let first = TranslationLeg::new(from, &self.intermediate);
        let second = TranslationLeg::new(&self.intermediate, to);
        if self.leg_available(&first).await? && self.leg_available(&second).await? {
            Ok(TranslationPlan::Pivot([first, second]))
        } else {
            Err(no_route())
        }
    }

    /// Translate `document` into `to`. The result keeps every segment's
    /// timing and order; `document` itself is never modified.
    pub async fn translate(&self, document: &SubtitleDocument, to: &LanguageCode) -> Result<SubtitleDocument> {
        let from = document.language();
        if from == to {
            return Ok(document.clone());
        }

        let plan = self.plan(from, to).await?;
        info!(
            "Translating {} segments {} using {}",
            document.len(),
            plan,
            self.backend.name()
        );

        for leg in plan.legs() {
            self.backend
                .acquire_resource(&leg.from, &leg.to)
                .await
                .map_err(|e| leg.unavailable(e))?;
        }

        let mut texts = document.texts();
        if texts.is_empty() {
            return document.with_texts(to.clone(), texts);
        }

        for leg in plan.legs() {
            let translated = self
                .backend
                .translate_batch(&texts, &leg.from, &leg.to)
                .await
                .map_err(|e| match e {
                    mismatch @ SubweaveError::TranslationCountMismatch { .. } => mismatch,
                    other => leg.unavailable(other),
                })?;

            if translated.len() != texts.len() {
                return Err(SubweaveError::TranslationCountMismatch {
                    expected: texts.len(),
                    actual: translated.len(),
                });
            }
            debug!("Leg {} -> {} returned {} parts", leg.from, leg.to, translated.len());
            texts = translated;
        }

        document.with_texts(to.clone(), texts)
    }
}
