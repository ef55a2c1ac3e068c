//! Longevity-research briefs. Pure Q&A: no data kinds, answers come
//! from a fixed set of evidence summaries with their citations carried
//! in the insights list.

use async_trait::async_trait;

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;
use vital_router::error::HandlerError;
use vital_router::handler::{Handler, SessionSnapshot};
use vital_router::index::tokenize_ascii;

const RESEARCH_KEYWORDS: [&str; 11] = [
    "research",
    "study",
    "studies",
    "evidence",
    "science",
    "scientific",
    "findings",
    "literature",
    "paper",
    "papers",
    "publication",
];

struct Brief {
    summary: &'static str,
    findings: &'static [&'static str],
    sources: &'static [&'static str],
}

static SLEEP_BRIEF: Brief = Brief {
    summary: "Sleep quality and duration are critical inputs to the aging process. Both short sleep (under 7 hours) and very long sleep (over 9 hours) are associated with accelerated aging and higher mortality risk.",
    findings: &[
        "Sleep deprivation increases oxidative stress and inflammation, two key drivers of biological aging.",
        "Poor sleep quality is associated with telomere shortening, a marker of cellular aging.",
        "Consistent sleep schedules support the circadian rhythms that regulate many age-related processes.",
    ],
    sources: &[
        "James S, et al. (2017). Sleep duration and telomere length in children. Journal of Pediatrics.",
        "Mander BA, et al. (2017). Sleep and Human Aging. Neuron.",
    ],
};

static EXERCISE_BRIEF: Brief = Brief {
    summary: "Regular physical activity is one of the most robust interventions for lowering biological age. Both aerobic work and resistance training show anti-aging effects at the cellular level.",
    findings: &[
        "Exercise increases mitochondrial biogenesis, improving cellular energy production.",
        "Regular activity slows telomere shortening.",
        "Resistance training preserves muscle mass that otherwise declines with age.",
        "Even walking 7,000-10,000 steps daily is associated with reduced biological age.",
    ],
    sources: &[
        "Robinson MM, et al. (2017). Enhanced protein translation underlies improved adaptations to exercise training. Cell Metabolism.",
        "Garatachea N, et al. (2015). Exercise attenuates the major hallmarks of aging. Rejuvenation Research.",
    ],
};

static METHODS_BRIEF: Brief = Brief {
    summary: "Biological age can be estimated several ways. The best-validated approaches are epigenetic clocks, which read DNA methylation patterns, and composite blood-biomarker models.",
    findings: &[
        "Epigenetic clocks such as Horvath's read DNA methylation at specific CpG sites.",
        "Blood-biomarker composites like PhenoAge estimate biological age from standard clinical markers.",
        "Telomere length gives a rougher estimate than the newer methods.",
    ],
    sources: &[
        "Horvath S (2013). DNA methylation age of human tissues and cell types. Genome Biology.",
        "Lu AT, et al. (2019). An epigenetic biomarker of aging for lifespan and healthspan. Aging.",
        "Levine ME, et al. (2018). Phenotypic Age: a novel signature of mortality and morbidity risk. Aging.",
    ],
};

static GENERAL_BRIEF: Brief = Brief {
    summary: "Biological age measures how well your body is functioning relative to your chronological age, derived from biomarkers that change as you age.",
    findings: &[
        "Biological age can run higher or lower than chronological age depending on lifestyle, genetics, and environment.",
        "Biological age predicts mortality and disease risk better than chronological age.",
        "Lifestyle interventions can reduce biological age even as chronological age advances.",
    ],
    sources: &[
        "Horvath S (2013). DNA methylation age of human tissues and cell types. Genome Biology.",
        "Belsky DW, et al. (2019). Quantitative integration of genetic and non-genetic determinants of aging. Current Opinion in Psychology.",
    ],
};

pub struct ResearchHandler {
    name: String,
    capabilities: Vec<String>,
}

impl ResearchHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: [
                "What does research say about biological age?",
                "Show me the evidence on longevity interventions",
                "How is biological age measured in studies?",
                "What does science say about sleep and aging?",
                "Explain the research behind epigenetic clocks",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[async_trait]
impl Handler for ResearchHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Summarizes longevity research with citations"
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn supported_data_kinds(&self) -> &[DataKind] {
        &[]
    }

    fn score(&self, query: &str, _session: &SessionSnapshot) -> f64 {
        let tokens = tokenize_ascii(query);
        let matches = RESEARCH_KEYWORDS
            .iter()
            .filter(|kw| tokens.iter().any(|t| t == *kw))
            .count();

        if matches > 2 {
            0.9
        } else if matches > 0 {
            0.7
        } else {
            0.2
        }
    }

    async fn process(
        &self,
        query: &str,
        _session: &SessionSnapshot,
    ) -> Result<CoachResponse, HandlerError> {
        let brief = brief_for(query);
        let mut response = CoachResponse::text(brief.summary);
        response.insights = brief
            .findings
            .iter()
            .map(|s| s.to_string())
            .chain(brief.sources.iter().map(|s| format!("Source: {s}")))
            .collect();
        Ok(response)
    }
}

fn brief_for(query: &str) -> &'static Brief {
    let tokens = tokenize_ascii(query);
    let has = |words: &[&str]| words.iter().any(|w| tokens.iter().any(|t| t == w));

    if has(&["sleep", "insomnia", "rest"]) {
        &SLEEP_BRIEF
    } else if has(&["exercise", "activity", "workout", "fitness", "training"]) {
        &EXERCISE_BRIEF
    } else if has(&[
        "measure",
        "measured",
        "calculate",
        "calculated",
        "clock",
        "clocks",
        "methylation",
        "epigenetic",
    ]) {
        &METHODS_BRIEF
    } else {
        &GENERAL_BRIEF
    }
}
