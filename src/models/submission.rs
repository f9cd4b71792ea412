use serde::{Deserialize, Serialize};

/// 一次评分的输入：原文、问题、学生答案
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub text: String,
    pub question: String,
    pub answer: String,
}

impl Submission {
    pub fn new(
        text: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// 三个字段是否都非空（忽略首尾空白）
    pub fn is_complete(&self) -> bool {
        !is_blank(&self.text) && !is_blank(&self.question) && !is_blank(&self.answer)
    }
}

/// 空字符串或仅包含空白
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// 内置示例（课堂场景）
pub fn classroom_sample() -> Submission {
    Submission::new(
        "Dans la cour de l'école, les élèves sont joyeux. Ils jouent en groupes. Certains font de la \
corde à sauter. D'autres jouent à cache-cache. On entend des rires partout.
En classe, la maîtresse explique la leçon de mathématiques avec un grand sourire. Elle \
écrit des chiffres au tableau. Les enfants l'écoutent avec attention.
Nous prenons nos livres et nos cahiers. Il est temps d'apprendre à faire des additions \
et à résoudre des problèmes. La maîtresse nous montre comment faire. Chacun essaie \
sur son cahier. Si on a du mal, on peut demander de l'aide. Petit à petit, on devient plus \
fort en maths.",
        "Que fait la maîtresse ?",
        "La maitresse explique la lecon de mathematiques et elle ecrit au tableau",
    )
}
