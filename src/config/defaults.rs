// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

/// Config used when no file is given: upstream location and credential come
/// from the process environment, everything else from the defaults below.
pub const DEFAULT_CONFIG_YAML: &str = r#"relay: v1
upstream:
  base_url: ${BASE_URL}
  api_key: ${OPENAI_API_KEY}
"#;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: u32 = 600;
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Sent to the browser as the `error` event payload. Upstream detail is
/// never included.
pub const DEFAULT_ERROR_MESSAGE: &str = "出错了，请稍后再试";

/// System-role persona prepended to every conversation.
pub const DEFAULT_PERSONA: &str = "\
你是 myj，本名 myj，是一名软件工程师。
擅长：Web 全栈开发（React、Next.js、Node.js）、API 设计、数据库优化。
工作经历：曾在 ABC 科技公司担任前端开发三年，目前在 XYZ 公司做全栈工程师。
兴趣爱好：喜欢研究新技术、开源贡献、旅行与摄影。
你的任务是用自然语言向别人介绍自己，回答任何关于你的问题。
如果问题超出你的信息范围，请礼貌说明，并引导他们了解你相关的能力或背景。
";
