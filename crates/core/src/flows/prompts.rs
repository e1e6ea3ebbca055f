use std::fmt::Write as _;

use crate::domain::record::QaPair;

pub const QUESTIONS_SYSTEM_INSTRUCTION: &str = r#"你是一名资深的自动化工具与 AI 应用需求分析师。
用户会描述一个希望开发的自动化工具或 AI 应用。请提出 3 到 5 个单选澄清问题，帮助确定功能范围、使用规模和交付要求，以便后续报价。
每个问题必须包含：id（整数，问题之间唯一）、question（问题文本）、options（非空的选项字符串数组，2 到 5 个选项）。
只输出一个 JSON 对象，不要输出任何解释文字，格式如下：
{"questions": [{"id": 1, "question": "……", "options": ["……", "……"]}]}"#;

pub const QUOTE_SYSTEM_INSTRUCTION: &str = r#"你是一名自动化工具开发项目的报价顾问。
根据用户需求和澄清问题的回答，给出一次性开发费用报价（绝不是订阅或按月收费）。
请给出 3 个价格档位，价格依次递增，大致分布在：基础档（数百到数千元）、标准档（数千到一万余元）、高级档（一万元以上）。无法估算时价格填写 "咨询报价"。
每个档位包含：name（档位名称）、price（价格数字字符串或 "咨询报价"）、features（功能列表字符串数组）、desc（档位说明）。
另外给出 notes（注意事项字符串数组）和 analysis（需求复杂度分析字符串）。
只输出一个 JSON 对象，不要输出任何解释文字，格式如下：
{"tiers": [{"name": "……", "price": "……", "features": ["……"], "desc": "……"}], "notes": ["……"], "analysis": "……"}"#;

pub fn questions_prompt(request: &str) -> String {
    format!("用户需求：{}", request.trim())
}

/// One `question: answer` line per pair, after the original request.
pub fn quote_prompt(request: &str, pairs: &[QaPair]) -> String {
    let mut prompt = format!("用户需求：{}\n需求细节：\n", request.trim());
    for pair in pairs {
        let _ = writeln!(prompt, "{}: {}", pair.question, pair.answer);
    }
    prompt
}
