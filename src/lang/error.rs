use super::Fragment;

pub struct Error {
    code: ErrorCode,
    fragment: Option<Fragment>,
    message: String,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident, $frag:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).in_fragment($frag)
    };
    ($err:ident; $($msg:tt)+) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message(format!($($msg)+))
    };
    ($err:ident, $frag:expr; $($msg:tt)+) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .in_fragment($frag)
            .message(format!($($msg)+))
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            fragment: None,
            message: String::new(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn fragment(&self) -> Option<&Fragment> {
        self.fragment.as_ref()
    }

    /// Attach a source location unless one is already known.
    pub fn in_fragment(self, fragment: &Fragment) -> Error {
        if self.fragment.is_some() {
            return self;
        }
        Error {
            fragment: Some(fragment.clone()),
            ..self
        }
    }

    pub fn message<S: Into<String>>(self, message: S) -> Error {
        debug_assert!(self.message.is_empty());
        Error {
            message: message.into(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // *** Source and lexical errors
    ImportNotFound,
    UnknownCharacter,
    UnknownOperator,
    MissedClosingQuote,
    WrongNumberFormat,
    BracketDoesNotMatch,
    MissedBracket,

    // *** Syntax errors
    UnexpectedSequence,
    UnexpectedEndOfFile,
    ExpectedExpression,
    ExpectedModuleName,
    ExpectedModuleExecutor,
    ModuleAlreadyExists,
    ExpectedAsKeyword,
    ExpectedDataType,
    ExpectedToKeyword,
    ExpectedThenKeyword,
    ExpectedTypeName,
    TypeAlreadyExists,
    ExpectedFunctionName,
    ExpectedArgument,
    ExpectedComma,
    ExpectedFieldName,
    ExpectedVariableName,
    ExpectedFileName,
    InvalidDataPrefix,
    DuplicateDataSet,
    FunctionAlreadyExists,
    CounterDoesNotMatch,

    // *** Semantic errors
    UnknownType,
    UnknownModule,
    UnknownField,
    UnknownOutputField,
    UnknownInputField,
    CannotResolveSymbol,
    DuplicateConstant,
    DuplicateField,
    DuplicateArgument,
    DuplicateVariable,
    DuplicateChannel,
    NonTransferableTypes,
    RecursiveDefinition,
    ExpectedConstantExpression,
    InvalidStringLength,
    IncompatibleTypes,
    IncompatibleArgumentType,
    InvalidNumberOfArguments,
    OperatorNotApplicable,
    ConditionMustBeBoolean,
    CounterMustBeNumeric,
    CanNotAssignToConstant,
    ExpressionIsNotAssignable,
    NotAStructure,
    FunctionDoesNotReturnValue,
    ReturnValueExpected,
    UnexpectedReturnValue,
    FieldCanNotBeConstant,
    FieldCanNotBeAbstract,
    ArgumentCanNotBeConstant,
    ArgumentCanNotBeAbstract,
    ReturnTypeCanNotBeConstant,
    ReturnTypeCanNotBeAbstract,
    VariableCanNotBeAbstract,

    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorCode::*;
        let s = match self {
            ImportNotFound => "IMPORT NOT FOUND",
            UnknownCharacter => "UNKNOWN CHARACTER",
            UnknownOperator => "UNKNOWN OPERATOR",
            MissedClosingQuote => "MISSED CLOSING QUOTE",
            WrongNumberFormat => "WRONG NUMBER FORMAT",
            BracketDoesNotMatch => "BRACKET DOES NOT MATCH",
            MissedBracket => "MISSED BRACKET",
            UnexpectedSequence => "UNEXPECTED SEQUENCE",
            UnexpectedEndOfFile => "UNEXPECTED END OF FILE",
            ExpectedExpression => "EXPECTED EXPRESSION",
            ExpectedModuleName => "EXPECTED MODULE NAME",
            ExpectedModuleExecutor => "EXPECTED MODULE EXECUTOR",
            ModuleAlreadyExists => "MODULE ALREADY EXISTS",
            ExpectedAsKeyword => "EXPECTED AS",
            ExpectedDataType => "EXPECTED DATA TYPE",
            ExpectedToKeyword => "EXPECTED TO",
            ExpectedThenKeyword => "EXPECTED THEN",
            ExpectedTypeName => "EXPECTED TYPE NAME",
            TypeAlreadyExists => "TYPE ALREADY EXISTS",
            ExpectedFunctionName => "EXPECTED FUNCTION NAME",
            ExpectedArgument => "EXPECTED ARGUMENT",
            ExpectedComma => "EXPECTED COMMA",
            ExpectedFieldName => "EXPECTED FIELD NAME",
            ExpectedVariableName => "EXPECTED VARIABLE NAME",
            ExpectedFileName => "EXPECTED FILE NAME",
            InvalidDataPrefix => "INVALID DATA PREFIX",
            DuplicateDataSet => "DUPLICATE DATA SET",
            FunctionAlreadyExists => "FUNCTION ALREADY EXISTS",
            CounterDoesNotMatch => "COUNTER DOES NOT MATCH",
            UnknownType => "UNKNOWN TYPE",
            UnknownModule => "UNKNOWN MODULE",
            UnknownField => "UNKNOWN FIELD",
            UnknownOutputField => "UNKNOWN OUTPUT FIELD",
            UnknownInputField => "UNKNOWN INPUT FIELD",
            CannotResolveSymbol => "CANNOT RESOLVE SYMBOL",
            DuplicateConstant => "DUPLICATE CONSTANT",
            DuplicateField => "DUPLICATE FIELD",
            DuplicateArgument => "DUPLICATE ARGUMENT",
            DuplicateVariable => "DUPLICATE VARIABLE",
            DuplicateChannel => "DUPLICATE CHANNEL",
            NonTransferableTypes => "NON-TRANSFERABLE TYPES",
            RecursiveDefinition => "RECURSIVE DEFINITION",
            ExpectedConstantExpression => "EXPECTED CONSTANT EXPRESSION",
            InvalidStringLength => "INVALID STRING LENGTH",
            IncompatibleTypes => "INCOMPATIBLE TYPES",
            IncompatibleArgumentType => "INCOMPATIBLE ARGUMENT TYPE",
            InvalidNumberOfArguments => "INVALID NUMBER OF ARGUMENTS",
            OperatorNotApplicable => "OPERATOR NOT APPLICABLE",
            ConditionMustBeBoolean => "CONDITION MUST BE BOOLEAN",
            CounterMustBeNumeric => "COUNTER MUST BE NUMERIC",
            CanNotAssignToConstant => "CAN NOT ASSIGN TO CONSTANT",
            ExpressionIsNotAssignable => "EXPRESSION IS NOT ASSIGNABLE",
            NotAStructure => "NOT A STRUCTURE",
            FunctionDoesNotReturnValue => "FUNCTION DOES NOT RETURN VALUE",
            ReturnValueExpected => "RETURN VALUE EXPECTED",
            UnexpectedReturnValue => "UNEXPECTED RETURN VALUE",
            FieldCanNotBeConstant => "FIELD CAN NOT BE CONSTANT",
            FieldCanNotBeAbstract => "FIELD CAN NOT BE ABSTRACT",
            ArgumentCanNotBeConstant => "ARGUMENT CAN NOT BE CONSTANT",
            ArgumentCanNotBeAbstract => "ARGUMENT CAN NOT BE ABSTRACT",
            ReturnTypeCanNotBeConstant => "RETURN TYPE CAN NOT BE CONSTANT",
            ReturnTypeCanNotBeAbstract => "RETURN TYPE CAN NOT BE ABSTRACT",
            VariableCanNotBeAbstract => "VARIABLE CAN NOT BE ABSTRACT",
            InternalError => "INTERNAL ERROR",
        };
        write!(f, "{}", s)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(fragment) = &self.fragment {
            write!(f, " IN {}", fragment)?;
        }
        if !self.message.is_empty() {
            write!(f, "; {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_display() {
        let file: Rc<str> = Rc::from("main.bas");
        let e = error!(UnknownType, &Fragment::new(&file, 3, 8..13); "{}", "Point3");
        assert_eq!(e.to_string(), "UNKNOWN TYPE IN main.bas:3 (8..13); Point3");
        assert_eq!(error!(InternalError).to_string(), "INTERNAL ERROR");
    }

    #[test]
    fn test_first_fragment_wins() {
        let file: Rc<str> = Rc::from("a.bas");
        let e = error!(ExpectedComma, &Fragment::new(&file, 1, 0..0));
        let e = e.in_fragment(&Fragment::new(&file, 9, 2..3));
        assert_eq!(e.fragment().map(|f| f.line), Some(1));
        assert_eq!(e.code(), ErrorCode::ExpectedComma);
    }
}
