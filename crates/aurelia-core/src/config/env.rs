use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_embedding();
        self.apply_env_overrides_index();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("AURELIA_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid AURELIA_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("AURELIA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("AURELIA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("AURELIA_LLM_MAX_TOKENS") {
            match v.parse::<u32>() {
                Ok(n) => self.llm.max_tokens = n,
                Err(_) => tracing::warn!("ignoring invalid AURELIA_LLM_MAX_TOKENS value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("AURELIA_LLM_TEMPERATURE") {
            match v.parse::<f32>() {
                Ok(t) => self.llm.temperature = t,
                Err(_) => tracing::warn!("ignoring invalid AURELIA_LLM_TEMPERATURE value: {v}"),
            }
        }
    }

    fn apply_env_overrides_embedding(&mut self) {
        if let Ok(v) = std::env::var("AURELIA_EMBEDDING_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.backend = backend;
            } else {
                tracing::warn!("ignoring invalid AURELIA_EMBEDDING_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("AURELIA_EMBEDDING_DIMENSION") {
            match v.parse::<usize>() {
                Ok(n) => self.embedding.dimension = n,
                Err(_) => tracing::warn!("ignoring invalid AURELIA_EMBEDDING_DIMENSION value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("AURELIA_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("AURELIA_EMBEDDING_DEVICE") {
            self.embedding.device = v;
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("AURELIA_INDEX_EXTENSIONS") {
            self.index.extensions = v
                .split(',')
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = std::env::var("AURELIA_INDEX_STRUCTURAL_SUMMARY") {
            match v.parse::<bool>() {
                Ok(enabled) => self.index.structural_summary = enabled,
                Err(_) => tracing::warn!(
                    "ignoring invalid AURELIA_INDEX_STRUCTURAL_SUMMARY value: {v}"
                ),
            }
        }
        if let Ok(v) = std::env::var("AURELIA_INDEX_RESPECT_GITIGNORE") {
            match v.parse::<bool>() {
                Ok(enabled) => self.index.respect_gitignore = enabled,
                Err(_) => tracing::warn!(
                    "ignoring invalid AURELIA_INDEX_RESPECT_GITIGNORE value: {v}"
                ),
            }
        }
        if let Ok(v) = std::env::var("AURELIA_RETRIEVAL_TOP_K") {
            match v.parse::<usize>() {
                Ok(k) => self.retrieval.top_k = k,
                Err(_) => tracing::warn!("ignoring invalid AURELIA_RETRIEVAL_TOP_K value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("AURELIA_RETRIEVAL_TRUNCATE_INPUTS") {
            match v.parse::<bool>() {
                Ok(enabled) => self.retrieval.truncate_inputs = enabled,
                Err(_) => tracing::warn!(
                    "ignoring invalid AURELIA_RETRIEVAL_TRUNCATE_INPUTS value: {v}"
                ),
            }
        }
    }
}
