//! Curated topic table with deterministic relevance scoring

use std::time::Duration;

use async_trait::async_trait;
use sibyl_cache::TtlCache;
use tracing::debug;

use crate::error::Result;

use super::{Knowledge, KnowledgeSource};

const RESULT_CACHE_ENTRIES: usize = 200;
const RESULT_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);

/// Minimum relevance score for a topic to be returned at all
const SCORE_THRESHOLD: f64 = 0.3;

/// Curated knowledge source: a static table of topic overviews scored
/// against the query with a deterministic relevance function. Fast,
/// zero-cost, and preferred by the aggregator over remote lookups.
pub struct TopicIndex {
    topics: &'static [(&'static str, &'static str)],
    cache: TtlCache<Knowledge>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self {
            topics: builtin_topics(),
            cache: TtlCache::bounded(RESULT_CACHE_TTL, RESULT_CACHE_ENTRIES),
        }
    }

    /// Best-scoring topic for the query, if it clears the threshold.
    async fn best_match(&self, normalized: &str) -> Knowledge {
        let mut best_score = 0.0;
        let mut best = Knowledge::default();

        for (key, overview) in self.topics.iter().copied() {
            let score = relevance(normalized, key);
            if score > best_score {
                best_score = score;
                best = Knowledge::new(title_case(key), overview);
            }
        }

        if best_score >= SCORE_THRESHOLD {
            debug!("topic match '{}' scored {:.2}", best.title, best_score);
            best
        } else {
            Knowledge::default()
        }
    }

    /// Plain substring scan used by the orchestrator's last-ditch fallback:
    /// the first topic whose key appears anywhere in the message.
    pub fn keyword_match(&self, message: &str) -> Option<(&'static str, &'static str)> {
        let lowered = message.to_lowercase();
        for (key, overview) in self.topics.iter().copied() {
            if lowered.contains(key) {
                return Some((key, overview));
            }
        }
        None
    }
}

impl Default for TopicIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeSource for TopicIndex {
    fn name(&self) -> &'static str {
        "topics"
    }

    async fn lookup(&self, query: &str) -> Result<Knowledge> {
        let normalized = query.to_lowercase();
        let cache_key: String = normalized.chars().take(50).collect();

        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(cached);
        }

        let result = self.best_match(&normalized).await;
        if !result.is_empty() {
            self.cache.set(cache_key, result.clone()).await;
        }

        Ok(result)
    }
}

/// Relevance of a topic key to a normalized query.
///
/// Exact match 1.0; key surrounded by word boundaries inside the query 0.9;
/// query starts with the key 0.8; key substring of query 0.7; query
/// substring of key 0.5; otherwise the word-overlap fraction scaled by 0.3.
fn relevance(query: &str, key: &str) -> f64 {
    if query == key {
        return 1.0;
    }

    if format!(" {} ", query).contains(&format!(" {} ", key)) {
        return 0.9;
    }

    if query.starts_with(key) {
        return 0.8;
    }

    if query.contains(key) {
        return 0.7;
    }

    if key.contains(query) {
        return 0.5;
    }

    let query_words: Vec<&str> = query.split_whitespace().collect();
    let key_words: Vec<&str> = key.split_whitespace().collect();
    let overlap = query_words
        .iter()
        .filter(|w| key_words.contains(w))
        .count();

    if overlap > 0 {
        0.3 * overlap as f64 / query_words.len().max(key_words.len()) as f64
    } else {
        0.0
    }
}

fn title_case(key: &str) -> String {
    key.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn builtin_topics() -> &'static [(&'static str, &'static str)] {
    &[
        (
            "ai",
            "Artificial Intelligence (AI) covers computer systems built to perform tasks that normally need human intelligence, such as reasoning, language understanding, and perception. Modern AI leans heavily on machine learning and deep neural networks, and shows up in assistants, recommendation systems, self-driving vehicles, and medical diagnosis tools.",
        ),
        (
            "machine learning",
            "Machine Learning is the branch of AI where systems improve from data instead of explicit programming. The main families are supervised learning on labeled examples, unsupervised learning that finds structure in unlabeled data, and reinforcement learning driven by rewards. Common algorithms include decision trees, support vector machines, and neural networks.",
        ),
        (
            "deep learning",
            "Deep Learning uses neural networks with many layers to learn representations directly from raw data. It powers modern computer vision, speech recognition, and natural language processing, and is usually built with frameworks such as TensorFlow and PyTorch.",
        ),
        (
            "neural networks",
            "Neural networks are computing systems loosely inspired by biological brains: layers of interconnected nodes that transform inputs into predictions. Stacked deeply they form the basis of deep learning, with applications from image recognition to language modeling.",
        ),
        (
            "nlp",
            "Natural Language Processing (NLP) is the field of AI concerned with reading, understanding, and generating human language. Applications include machine translation, sentiment analysis, chatbots, and summarization; transformer models have driven most recent progress.",
        ),
        (
            "programming",
            "Programming is the craft of writing instructions for computers using languages such as Python, JavaScript, Java, C++, and Rust. It spans paradigms (procedural, object-oriented, functional) and is supported by tooling like version control, IDEs, and CI/CD pipelines.",
        ),
        (
            "python",
            "Python is a high-level, interpreted programming language prized for readability and versatility. First released in 1991, it dominates data science, scripting, automation, and web backends, with an ecosystem that includes NumPy, Pandas, and scikit-learn.",
        ),
        (
            "blockchain",
            "Blockchain is a distributed ledger in which cryptographically linked blocks of transactions are replicated across many nodes, making the history tamper-resistant without a trusted third party. It underpins cryptocurrencies like Bitcoin and Ethereum and supports applications such as smart contracts and supply-chain tracking.",
        ),
        (
            "cryptocurrency",
            "Cryptocurrency is digital money secured by cryptography and operated on decentralized blockchain networks rather than by central banks. Bitcoin, launched in 2009, was the first; thousands of others, including Ethereum, followed with different trade-offs around speed, cost, and programmability.",
        ),
        (
            "cybersecurity",
            "Cybersecurity is the practice of defending systems, networks, and data from digital attacks such as malware, phishing, and denial-of-service. Defenses combine technical controls (firewalls, encryption, intrusion detection) with operational discipline and user education.",
        ),
        (
            "cricket",
            "Cricket is a bat-and-ball game between two teams of eleven, played on an oval field with a 22-yard pitch at its center. Originating in England, it is hugely popular in India, Australia, Pakistan, and the West Indies, with formats ranging from five-day Tests to Twenty20.",
        ),
        (
            "football",
            "Football (soccer) is the world's most popular sport: two teams of eleven players trying to put a spherical ball into the opposing goal. The FIFA World Cup, held every four years, and domestic leagues such as the Premier League and La Liga draw global audiences.",
        ),
        (
            "olympics",
            "The Olympic Games are an international multi-sport competition held every four years in summer and winter editions, organized by the International Olympic Committee. Thousands of athletes compete across disciplines from athletics and swimming to skiing and figure skating.",
        ),
        (
            "movies",
            "Movies tell stories through moving images across genres from drama and comedy to science fiction and documentary. Major production centers include Hollywood and Bollywood, and the Academy Awards remain the industry's most prominent honors.",
        ),
        (
            "music",
            "Music arranges sound in time through melody, harmony, and rhythm, spanning classical, rock, pop, jazz, hip-hop, electronic, and folk traditions worldwide. Streaming platforms have reshaped how it is distributed and discovered.",
        ),
        (
            "mental health",
            "Mental health covers emotional, psychological, and social well-being. Common conditions include depression and anxiety disorders; treatment typically combines therapy, medication, and lifestyle support, and reducing stigma remains a public-health priority.",
        ),
        (
            "climate change",
            "Climate change is the long-term shift in temperatures and weather patterns driven mainly by burning fossil fuels. Consequences include rising seas, extreme weather, and ecosystem disruption; responses combine emission cuts, renewable energy, and adaptation, coordinated internationally through the Paris Agreement.",
        ),
        (
            "renewable energy",
            "Renewable energy comes from naturally replenished sources: sunlight, wind, water, biomass, and geothermal heat. Unlike fossil fuels these do not deplete, and scaling them up is central to cutting carbon emissions.",
        ),
        (
            "stock market",
            "The stock market is the collection of exchanges, such as the NYSE and NASDAQ, where shares of companies are traded. It lets businesses raise capital and investors participate in their growth, with prices moved by earnings, economic indicators, and sentiment.",
        ),
    ]
}
