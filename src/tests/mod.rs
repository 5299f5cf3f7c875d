mod support;

mod recommend;
