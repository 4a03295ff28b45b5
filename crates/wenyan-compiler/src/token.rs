//! Token stream shape produced by the tokenizer (§3 "Token").

pub type Span = std::ops::Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    ThereIs,        // 吾有
    ThereIsNow,     // 今有
    Means,          // 曰
    NameIt,         // 名之曰
    SelfKw,         // 其
    EndYiSentence,  // 是矣
    EndYeSentence,  // 是也
    Add,            // 加
    Sub,            // 減
    Mul,            // 乘
    Div,            // 除
    With,           // 以
    PipeInvoke,     // 以施
    Push,           // 夫
    Print,          // 書之
    Clear,          // 爾汝忘之
    Former,         // 昔之
    ThatWhich,      // 者
    Now,            // 今
    NoLongerExists, // 不復存矣
    Append,         // 充
    Concat,         // 銜
    LengthOf,       // 之長
    Of,             // 之
    NewObject,      // 乃造一物
    ValueOf,        // 之值
    If,             // 若
    ElseIf,         // 或若
    Else,           // 若非
    EndYunYun,      // 云云
    EndYe,          // 也
    EndShiWei,      // 是謂
    IfSelfTrue,     // 若其然者
    IfSelfFalse,    // 若其不然者
    While,          // 恆為是
    For,            // 為是
    Times,          // 遍
    Foreach,        // 凡
    ForeachVar,     // 中之
    Continue,       // 乃止是遍
    Break,          // 乃止
    ReturnPopStack, // 乃得矣
    ReturnValue,    // 乃得
    ReturnEmpty,    // 乃歸空無
    ProcWillRun,    // 欲行是術
    ParamsRequire,  // 必先得
    RestMarker,     // 其餘
    ProcBodyOpenA,  // 是術曰
    ProcBodyOpenB,  // 乃行是術曰
    ProcDefClose,   // 之術也
    Take,           // 取
    TryOpen,        // 姑妄行此
    CatchIntro,     // 如事不諧
    CaseFault,      // 豈
    CaseFaultEnd,   // 之禍歟
    CatchAll,       // 不知何禍歟
    TryClose,       // 乃作罷
    Raise,          // 嗚呼
    RaiseFault,     // 之禍
    ImportKw,       // 吾嘗觀
    ImportBook,     // 之書
    Expose,         // 方悟
    ExposeSuffix,   // 之義
    MacroDef,       // 或云
    MacroReplace,   // 蓋謂
    TypeNumber,     // 數
    TypeString,     // 言
    TypeBool,       // 爻
    TypeList,       // 列
    TypeObject,     // 物
    TypeProc,       // 術
    TypeAny,        // 元
    Eq,             // 等於
    Ne,             // 不等於
    Ge,             // 不小於
    Le,             // 不大於
    Lt,             // 小於
    Gt,             // 大於
    And,            // 且
    Or,             // 或
    ContainsTruthy, // 中有陽乎
    ContainsFalsy,  // 中無陰乎
    BoolTrue,       // 然
    BoolFalse,      // 不然
    Public,         // 蓋
    NotKw,          // 非
    Invoke,         // 施
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Kw),
    Identifier(String),
    StringLiteral(String),
    NumberLiteral(String),
    Data(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
