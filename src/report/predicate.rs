// Capture predicates - declarative rules for when to take a bugreport

use std::fmt;
use std::str::FromStr;

use crate::error::PredicateError;

/// When, relative to the subject, a capture happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    After,
    AtStartOf,
}

/// How often the predicate fires within its enclosing scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Freq {
    Each,
    First,
}

/// What the predicate is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Noun {
    Testcase,
    FailedTestcase,
    Testrun,
    FailedTestrun,
    Invocation,
    FailedInvocation,
}

/// Secondary condition on the items contained in the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    WithFailing,
    WithPassing,
    WithAny,
}

/// Granularity of a noun, ordered from narrowest to widest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Testcase,
    Testrun,
    Invocation,
}

impl Noun {
    pub fn scope(self) -> Scope {
        match self {
            Noun::Testcase | Noun::FailedTestcase => Scope::Testcase,
            Noun::Testrun | Noun::FailedTestrun => Scope::Testrun,
            Noun::Invocation | Noun::FailedInvocation => Scope::Invocation,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            Noun::FailedTestcase | Noun::FailedTestrun | Noun::FailedInvocation
        )
    }
}

impl Relation {
    const ALL: [Relation; 2] = [Relation::After, Relation::AtStartOf];

    fn as_str(self) -> &'static str {
        match self {
            Relation::After => "AFTER",
            Relation::AtStartOf => "AT_START_OF",
        }
    }
}

impl Freq {
    const ALL: [Freq; 2] = [Freq::Each, Freq::First];

    fn as_str(self) -> &'static str {
        match self {
            Freq::Each => "EACH",
            Freq::First => "FIRST",
        }
    }
}

impl Noun {
    // Longer names first so FAILED_TESTCASE is never read as a prefix match
    const ALL: [Noun; 6] = [
        Noun::FailedTestcase,
        Noun::FailedTestrun,
        Noun::FailedInvocation,
        Noun::Testcase,
        Noun::Testrun,
        Noun::Invocation,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Noun::Testcase => "TESTCASE",
            Noun::FailedTestcase => "FAILED_TESTCASE",
            Noun::Testrun => "TESTRUN",
            Noun::FailedTestrun => "FAILED_TESTRUN",
            Noun::Invocation => "INVOCATION",
            Noun::FailedInvocation => "FAILED_INVOCATION",
        }
    }
}

impl Filter {
    const ALL: [Filter; 3] = [Filter::WithFailing, Filter::WithPassing, Filter::WithAny];

    fn as_str(self) -> &'static str {
        match self {
            Filter::WithFailing => "WITH_FAILING",
            Filter::WithPassing => "WITH_PASSING",
            Filter::WithAny => "WITH_ANY",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(Relation, Freq, Noun, Filter);

/// One rejected shape of predicate
struct InvalidCombination {
    applies: fn(&Predicate) -> bool,
    reason: &'static str,
}

/// Every predicate shape that can never fire sensibly
const INVALID_COMBINATIONS: &[InvalidCombination] = &[
    InvalidCombination {
        applies: |p| p.relation == Relation::AtStartOf && p.noun.is_failed(),
        reason: "whether something failed is unknown at its start",
    },
    InvalidCombination {
        applies: |p| p.freq == Freq::First && p.noun.scope() == Scope::Invocation,
        reason: "an invocation happens only once, FIRST is meaningless",
    },
    InvalidCombination {
        applies: |p| p.filter.is_some() && p.relation != Relation::After,
        reason: "a filter can only be evaluated after its subject completes",
    },
    InvalidCombination {
        applies: |p| {
            p.filter
                .is_some_and(|(_, noun)| !matches!(noun, Noun::Testcase | Noun::Testrun))
        },
        reason: "the filter subject must be TESTCASE or TESTRUN",
    },
    InvalidCombination {
        applies: |p| {
            p.filter
                .is_some_and(|(_, noun)| noun.scope() >= p.noun.scope())
        },
        reason: "the filter subject must be narrower than the predicate subject",
    },
];

/// A rule such as `AFTER EACH FAILED_TESTCASE` describing when a capture
/// should fire.
///
/// Predicates are validated on construction. Equality compares the full
/// tuple including the filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Predicate {
    relation: Relation,
    freq: Freq,
    noun: Noun,
    filter: Option<(Filter, Noun)>,
}

/// Capture after every failed test case
pub const AFTER_FAILED_TESTCASES: Predicate = Predicate {
    relation: Relation::After,
    freq: Freq::Each,
    noun: Noun::FailedTestcase,
    filter: None,
};

/// Capture when the first test case of each run starts
pub const AT_START_OF_FIRST_TESTCASE: Predicate = Predicate {
    relation: Relation::AtStartOf,
    freq: Freq::First,
    noun: Noun::Testcase,
    filter: None,
};

impl Predicate {
    pub fn new(relation: Relation, freq: Freq, noun: Noun) -> Result<Self, PredicateError> {
        Self {
            relation,
            freq,
            noun,
            filter: None,
        }
        .validate()
    }

    pub fn with_filter(
        relation: Relation,
        freq: Freq,
        noun: Noun,
        filter: Filter,
        filter_noun: Noun,
    ) -> Result<Self, PredicateError> {
        Self {
            relation,
            freq,
            noun,
            filter: Some((filter, filter_noun)),
        }
        .validate()
    }

    fn validate(self) -> Result<Self, PredicateError> {
        match INVALID_COMBINATIONS.iter().find(|rule| (rule.applies)(&self)) {
            Some(rule) => Err(PredicateError {
                predicate: self.to_string(),
                reason: rule.reason,
            }),
            None => Ok(self),
        }
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn freq(&self) -> Freq {
        self.freq
    }

    pub fn noun(&self) -> Noun {
        self.noun
    }

    pub fn filter(&self) -> Option<(Filter, Noun)> {
        self.filter
    }

    /// Same relation, frequency and noun; filter clauses are ignored
    pub fn partial_match(&self, other: &Predicate) -> bool {
        self.relation == other.relation && self.freq == other.freq && self.noun == other.noun
    }

    /// Partial match plus an identical filter clause
    pub fn full_match(&self, other: &Predicate) -> bool {
        self.partial_match(other) && self.filter == other.filter
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.relation, self.freq, self.noun)?;
        if let Some((filter, noun)) = self.filter {
            write!(f, "_{}_{}", filter, noun)?;
        }
        Ok(())
    }
}

fn take_token<'a, T: Copy + fmt::Display>(input: &'a str, options: &[T]) -> Option<(T, &'a str)> {
    options.iter().find_map(|option| {
        let rest = input.strip_prefix(&option.to_string())?;
        if rest.is_empty() {
            Some((*option, rest))
        } else {
            rest.strip_prefix('_').map(|rest| (*option, rest))
        }
    })
}

impl FromStr for Predicate {
    type Err = PredicateError;

    /// Parse the `Display` form, e.g. `AFTER_EACH_INVOCATION_WITH_ANY_TESTCASE`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PredicateError {
            predicate: s.to_string(),
            reason: "expected RELATION_FREQ_NOUN[_FILTER_NOUN]",
        };
        let input = s.trim();
        let (relation, rest) = take_token(input, &Relation::ALL).ok_or_else(malformed)?;
        let (freq, rest) = take_token(rest, &Freq::ALL).ok_or_else(malformed)?;
        let (noun, rest) = take_token(rest, &Noun::ALL).ok_or_else(malformed)?;
        if rest.is_empty() {
            return Predicate::new(relation, freq, noun);
        }
        let (filter, rest) = take_token(rest, &Filter::ALL).ok_or_else(malformed)?;
        let (filter_noun, rest) = take_token(rest, &Noun::ALL).ok_or_else(malformed)?;
        if !rest.is_empty() {
            return Err(malformed());
        }
        Predicate::with_filter(relation, freq, noun, filter, filter_noun)
    }
}
