//! JMeter vocabulary: the tag and property names the analyzers depend on

/// Attribute carrying an element's human-readable name
pub const DISPLAY_NAME: &str = "testname";

/// Sibling wrapper that holds the logical children of the element before it
pub const HASH_TREE: &str = "hashTree";

pub const TEST_PLAN: &str = "TestPlan";

/// First segment JMeter writes into a module controller path
pub const PLAN_PATH_MARKER: &str = "Test Plan";

/// Reported container name for elements outside any logical container
pub const UNASSIGNED_CONTAINER: &str = "Global/Unassigned";

pub const THREAD_GROUP_TAGS: &[&str] = &[
    "ThreadGroup",
    "SetupThreadGroup",
    "PostThreadGroup",
    "TestFragmentController",
];

pub const TRANSACTION_CONTROLLER: &str = "TransactionController";

pub const MODULE_CONTROLLER: &str = "ModuleController";
pub const MODULE_NODE_PATH: &str = "ModuleController.node_path";

/// Logic controllers that group children but are not transactions
pub const LOGIC_CONTROLLER_TAGS: &[&str] = &[
    "LoopController",
    "IfController",
    "WhileController",
    "ForeachController",
    "GenericController",
    "OnceOnlyController",
    "RunTime",
    "SwitchController",
    "ThroughputController",
    "RandomController",
    "RandomOrderController",
    "InterleaveControl",
    "CriticalSectionController",
];

pub const HTTP_SAMPLER: &str = "HTTPSamplerProxy";
pub const HTTP_DOMAIN: &str = "HTTPSampler.domain";
pub const HTTP_PORT: &str = "HTTPSampler.port";
pub const HTTP_PATH: &str = "HTTPSampler.path";
pub const HTTP_METHOD: &str = "HTTPSampler.method";
pub const HTTP_RAW_BODY_FLAG: &str = "HTTPSampler.postBodyRaw";
pub const HTTP_ARGUMENTS: &str = "HTTPsampler.Arguments";

pub const ARGUMENTS: &str = "Arguments";
pub const ARGUMENT_LIST: &str = "Arguments.arguments";
pub const ARGUMENT_NAME: &str = "Argument.name";
pub const ARGUMENT_VALUE: &str = "Argument.value";
pub const PLAN_VARIABLES: &str = "TestPlan.user_defined_variables";

pub const HEADER_MANAGER: &str = "HeaderManager";
pub const HEADER_LIST: &str = "HeaderManager.headers";
pub const HEADER_NAME: &str = "Header.name";
pub const HEADER_VALUE: &str = "Header.value";

pub const AUTH_MANAGER: &str = "AuthManager";
pub const AUTH_LIST: &str = "AuthManager.auth_list";
pub const AUTH_USERNAME: &str = "Authorization.username";
pub const AUTH_PASSWORD: &str = "Authorization.password";

pub const CSV_DATA_SET: &str = "CSVDataSet";
pub const CSV_VARIABLE_NAMES: &str = "variableNames";
pub const COUNTER: &str = "CounterConfig";
pub const COUNTER_NAME: &str = "CounterConfig.name";
pub const RANDOM_VARIABLE: &str = "RandomVariableConfig";
pub const RANDOM_VARIABLE_NAME: &str = "variableName";

pub const FOREACH_CONTROLLER: &str = "ForeachController";
pub const FOREACH_INPUT: &str = "ForeachController.inputVal";
pub const FOREACH_OUTPUT: &str = "ForeachController.returnVal";

pub const LOOP_CONTROLLER: &str = "LoopController";
pub const LOOP_COUNT: &str = "LoopController.loops";

/// Timer tags and the properties holding their delays
pub const TIMERS: &[(&str, &[&str])] = &[
    ("ConstantTimer", &["ConstantTimer.delay"]),
    ("UniformRandomTimer", &["ConstantTimer.delay", "RandomTimer.range"]),
    ("GaussianRandomTimer", &["ConstantTimer.delay", "RandomTimer.range"]),
    ("PoissonRandomTimer", &["ConstantTimer.delay", "RandomTimer.range"]),
];

/// Script elements whose body may call `vars.put` / `vars.get`
pub const SCRIPT_ELEMENTS: &[&str] = &[
    "JSR223PreProcessor",
    "JSR223PostProcessor",
    "JSR223Sampler",
    "JSR223Assertion",
    "BeanShellPreProcessor",
    "BeanShellPostProcessor",
    "BeanShellSampler",
];
pub const SCRIPT_PROPS: &[&str] = &["script", "BeanShellSampler.query"];

/// Extractor scope property; absent means "main sample only"
pub const SCOPE: &str = "Sample.scope";
pub const PREFERRED_SCOPE: &str = "parent";

/// How one extractor family stores its settings
#[derive(Debug)]
pub struct ExtractorKind {
    /// Kind label used in issue records
    pub kind: &'static str,
    pub tags: &'static [&'static str],
    pub reference_names: &'static str,
    /// Separator for multi-name properties (JSON extractor only)
    pub separator: Option<char>,
    pub default_value: &'static str,
    pub match_number: &'static str,
    /// Properties that together make up the extraction expression
    pub expression: &'static [&'static str],
    /// Required prefix of the extractor's own display name
    pub name_prefix: &'static str,
}

pub const EXTRACTORS: &[ExtractorKind] = &[
    ExtractorKind {
        kind: "RegexExtractor",
        tags: &["RegexExtractor"],
        reference_names: "RegexExtractor.refname",
        separator: None,
        default_value: "RegexExtractor.default",
        match_number: "RegexExtractor.match_number",
        expression: &["RegexExtractor.regex", "RegexExtractor.template"],
        name_prefix: "REGEXP_",
    },
    ExtractorKind {
        kind: "JSONPostProcessor",
        tags: &["JSONPostProcessor"],
        reference_names: "JSONPostProcessor.referenceNames",
        separator: Some(';'),
        default_value: "JSONPostProcessor.defaultValues",
        match_number: "JSONPostProcessor.match_numbers",
        expression: &["JSONPostProcessor.jsonPathExprs"],
        name_prefix: "JSON_",
    },
    ExtractorKind {
        kind: "XPathExtractor",
        tags: &["XPathExtractor"],
        reference_names: "XPathExtractor.refname",
        separator: None,
        default_value: "XPathExtractor.default",
        match_number: "XPathExtractor.matchNumber",
        expression: &["XPathExtractor.xpathQuery"],
        name_prefix: "XPATH_",
    },
    ExtractorKind {
        kind: "XPath2Extractor",
        tags: &["XPath2Extractor"],
        reference_names: "XPathExtractor2.refname",
        separator: None,
        default_value: "XPathExtractor2.default",
        match_number: "XPathExtractor2.matchNumber",
        expression: &["XPathExtractor2.xpathQuery"],
        name_prefix: "XPATH_",
    },
    ExtractorKind {
        kind: "CssSelectorExtractor",
        tags: &["CssSelectorExtractor", "HtmlExtractor"],
        reference_names: "HtmlExtractor.refname",
        separator: None,
        default_value: "HtmlExtractor.default",
        match_number: "HtmlExtractor.match_number",
        expression: &["HtmlExtractor.expr", "HtmlExtractor.attribute"],
        name_prefix: "CSS_",
    },
    ExtractorKind {
        kind: "BoundaryExtractor",
        tags: &["BoundaryExtractor"],
        reference_names: "BoundaryExtractor.refname",
        separator: None,
        default_value: "BoundaryExtractor.default",
        match_number: "BoundaryExtractor.match_number",
        expression: &["BoundaryExtractor.lboundary", "BoundaryExtractor.rboundary"],
        name_prefix: "BOUNDARY_",
    },
];

/// Extractor family for a tag, if it is an extractor
pub fn extractor_kind(tag: &str) -> Option<&'static ExtractorKind> {
    EXTRACTORS.iter().find(|k| k.tags.contains(&tag))
}

pub fn is_thread_group(tag: &str) -> bool {
    THREAD_GROUP_TAGS.contains(&tag)
}

/// Logical containers: thread groups, fragments and transactions
pub fn is_container(tag: &str) -> bool {
    is_thread_group(tag) || tag == TRANSACTION_CONTROLLER
}

pub fn is_logic_controller(tag: &str) -> bool {
    LOGIC_CONTROLLER_TAGS.contains(&tag)
}

/// True for `${...}` anywhere in the value
pub fn contains_placeholder(value: &str) -> bool {
    value.contains("${")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_kind_lookup() {
        assert_eq!(extractor_kind("RegexExtractor").unwrap().name_prefix, "REGEXP_");
        assert_eq!(extractor_kind("HtmlExtractor").unwrap().kind, "CssSelectorExtractor");
        assert_eq!(extractor_kind("JSONPostProcessor").unwrap().separator, Some(';'));
        assert!(extractor_kind("HTTPSamplerProxy").is_none());
    }

    #[test]
    fn test_container_classification() {
        assert!(is_container("ThreadGroup"));
        assert!(is_container("TransactionController"));
        assert!(!is_container("LoopController"));
        assert!(is_logic_controller("LoopController"));
        assert!(!is_thread_group("TransactionController"));
    }
}
